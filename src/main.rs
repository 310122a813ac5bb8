use std::io::{self, BufRead, Write};

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use itertools::Itertools;
use tracing_subscriber::EnvFilter;

use mforth::{Event, Session};

fn main() -> anyhow::Result<()> {
    color_backtrace::install();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let app = App::parse();
    let mut session = Session::new();

    if !app.eval.is_empty() {
        for line in &app.eval {
            run_line(&mut session, line);
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{}", app.prompt);
        io::stdout().flush().context("Unable to write the prompt")?;
        let line = match lines.next() {
            Some(line) => line.context("Unable to read from stdin")?,
            None => break,
        };
        match line.trim() {
            ":quit" | ":q" => break,
            ":defs" => println!("{}", session.namespace.names().into_iter().join(" ")),
            ":clear" => {
                session.clear();
                println!(">");
            }
            _ => run_line(&mut session, &line),
        }
    }
    println!();
    Ok(())
}

#[derive(Parser)]
#[clap(name = "mforth", about = "A small postfix stack language")]
struct App {
    /// Evaluate these lines in order, then exit
    #[clap(short, long)]
    eval: Vec<String>,
    #[clap(long, default_value = "mforth: ")]
    prompt: String,
}

fn run_line(session: &mut Session, line: &str) {
    match session.commit(line) {
        Ok(events) => {
            for event in events {
                match event {
                    Event::Fault(error) => println!("{} {}", "error:".red().bold(), error),
                    trace => println!("{}", trace.to_string().dimmed()),
                }
            }
            println!("> {}", session.stack);
        }
        Err(error) => println!("{}", error),
    }
}
