use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ListResult, ReportView, StatusResult};
use crate::share::SaveOutcome;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_view(result: &ReportView) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_save(result: &SaveOutcome) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_status(result: &StatusResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::app::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::app::ProgressEvent) {}
}

/// Plain-text progress for interactive runs: phase events straight to stderr.
pub struct TextProgress;

impl crate::app::ProgressSink for TextProgress {
    fn event(&self, event: crate::app::ProgressEvent) {
        eprintln!("  {}", event.message);
    }
}
