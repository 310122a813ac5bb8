//! Hand-off of sessions between panes.
//!
//! Each pane owns its own [`Session`]. Publishing sends a copy; a subscriber
//! only ever sees the newest publication, older ones are dropped unread.

use std::sync::{Arc, Weak};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use tracing::debug;

use crate::{eval::Event, parse::ParseResult, session::Session};

/// A one-slot hand-off. The publisher keeps its own handle on the slot so it
/// can throw away a snapshot nobody read yet.
pub fn link() -> (Publisher, Subscriber) {
    let (sender, receiver) = channel::bounded(1);
    let alive = Arc::new(());
    let publisher = Publisher {
        sender,
        stale: receiver.clone(),
        subscriber: Arc::downgrade(&alive),
    };
    let subscriber = Subscriber {
        receiver,
        _alive: alive,
    };
    (publisher, subscriber)
}

#[derive(Debug, Clone)]
pub struct Publisher {
    sender: Sender<Session>,
    stale: Receiver<Session>,
    subscriber: Weak<()>,
}

impl Publisher {
    /// Replace whatever is waiting with `snapshot`. Returns `false` once the
    /// subscriber is gone.
    pub fn publish(&self, mut snapshot: Session) -> bool {
        loop {
            if self.subscriber.upgrade().is_none() {
                return false;
            }
            match self.sender.try_send(snapshot) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    let _ = self.stale.try_recv();
                    snapshot = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

#[derive(Debug)]
pub struct Subscriber {
    receiver: Receiver<Session>,
    _alive: Arc<()>,
}

impl Subscriber {
    /// Never blocks
    pub fn latest(&self) -> Option<Session> {
        self.receiver.try_iter().last()
    }
}

#[derive(Debug, Default)]
pub struct Pane {
    session: Session,
    upstream: Option<Subscriber>,
    downstream: Vec<Publisher>,
}

impl Pane {
    pub fn new() -> Self {
        Pane::default()
    }
    pub fn session(&self) -> &Session {
        &self.session
    }
    pub fn follow(&mut self, upstream: Subscriber) {
        self.upstream = Some(upstream);
    }
    pub fn subscribe(&mut self) -> Subscriber {
        let (publisher, subscriber) = link();
        self.downstream.push(publisher);
        subscriber
    }
    /// Resume from the newest upstream snapshot if one arrived, evaluate
    /// `line`, then publish the result downstream.
    pub fn commit(&mut self, line: &str) -> ParseResult<Vec<Event>> {
        if let Some(base) = self.upstream.as_ref().and_then(Subscriber::latest) {
            debug!(stack = %base.stack, "resuming from upstream");
            self.session = base;
        }
        let events = self.session.commit(line)?;
        let session = &self.session;
        self.downstream
            .retain(|publisher| publisher.publish(session.clone()));
        Ok(events)
    }
}
