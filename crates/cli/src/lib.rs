//! The `findxml` command.

mod args;
mod help;

pub use args::{Invocation, parse_args};

use anyhow::Result;
use findxml_core::{FindXml, WriterSink};
use std::ffi::OsString;
use std::io::Write;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[cfg(test)]
use tempfile as _;

/// Runs the command with the process arguments, writing to stdout.
pub fn run() -> Result<()> {
    init_tracing();
    let stdout = std::io::stdout();
    execute(std::env::args_os().skip(1), &mut stdout.lock())
}

/// Logs go to stderr so that stdout carries nothing but results.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Runs the command with explicit arguments (program name excluded) and output.
pub fn execute<I, T>(args: I, out: &mut dyn Write) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    match parse_args(args)? {
        Invocation::Usage => writeln!(out, "{}", help::USAGE)?,
        Invocation::Help => {
            writeln!(out, "{}", help::USAGE)?;
            writeln!(out, "{}", help::DETAILS)?;
        }
        Invocation::Search { settings, patterns } => {
            tracing::debug!(?settings, ?patterns, "starting search");
            let finder = FindXml::new(settings);
            let mut sink = WriterSink::new(&mut *out);
            finder.find_in_files(&patterns, &mut sink)?;
        }
    }
    out.flush()?;
    Ok(())
}
