//! JSON-lines event ingestion.
//!
//! Input is read on its own thread so a stop request ends ingestion even
//! while the reader is blocked waiting for more input.

use std::io::BufRead;
use std::thread;
use crossbeam::channel::{self, Receiver};
use crate::{Error, Result};
use crate::atlas::{Atlas, Recorded};
use crate::event::PlatformEvent;

/// Totals for one ingest run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub events: usize,
    /// Lines that failed to parse or record
    pub skipped: usize,
    pub recorded: Recorded,
    /// Stopped by a stop request or a closed dispatcher before input ended
    pub interrupted: bool,
}

/// Read lines from `reader` on a helper thread.
///
/// The thread exits at end of input or once the receiver is dropped; a
/// thread blocked on input is left behind when ingestion stops early.
pub fn spawn_line_reader<R>(reader: R) -> Result<Receiver<std::io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = channel::bounded(64);
    thread::Builder::new()
        .name("emoji-atlas-reader".to_string())
        .spawn(move || {
            for line in reader.lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Record every event line until input ends or `stop` fires.
///
/// Dropping every sender of `stop` also ends the run, so callers keep one
/// alive for as long as ingestion should continue.
///
/// Unparseable lines and events that fail to record are logged and skipped.
/// A closed dispatcher ends the run as interrupted. `progress` is called
/// after each recorded event.
pub fn ingest_lines(
    atlas: &Atlas,
    lines: &Receiver<std::io::Result<String>>,
    stop: &Receiver<()>,
    mut progress: impl FnMut(&IngestSummary),
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();
    let mut line_no = 0usize;

    loop {
        if stop.try_recv().is_ok() {
            summary.interrupted = true;
            break;
        }

        let line = crossbeam::select! {
            recv(stop) -> _ => {
                summary.interrupted = true;
                break;
            }
            recv(lines) -> line => match line {
                Ok(line) => line?,
                Err(_) => break,
            },
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event = match PlatformEvent::from_json(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Line {}: {}", line_no, e);
                summary.skipped += 1;
                continue;
            }
        };

        match atlas.handle(&event) {
            Ok(recorded) => {
                summary.events += 1;
                summary.recorded += recorded;
                progress(&summary);
            }
            Err(Error::DispatcherClosed) => {
                tracing::warn!("Dispatcher closed at line {}, stopping ingest", line_no);
                summary.interrupted = true;
                break;
            }
            Err(e) => {
                tracing::warn!("Line {}: {}", line_no, e);
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}
