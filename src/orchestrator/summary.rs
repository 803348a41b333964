//! End-of-run summary.

use chrono::{DateTime, Local};

use crate::matching::ReconciliationSession;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: usize,
    pub references: usize,
    pub auto_matched: usize,
    pub manually_resolved: usize,
    pub excluded: usize,
    pub facilities: usize,
    pub outputs: Vec<String>,
    pub started: DateTime<Local>,
    pub ended: DateTime<Local>,
}

impl RunSummary {
    pub fn new(records: usize, references: usize) -> Self {
        let now = Local::now();
        Self {
            records,
            references,
            auto_matched: 0,
            manually_resolved: 0,
            excluded: 0,
            facilities: 0,
            outputs: Vec::new(),
            started: now,
            ended: now,
        }
    }

    /// Counts taken right after the join, before any manual entry.
    pub fn with_auto_matched(mut self, session: &ReconciliationSession) -> Self {
        self.auto_matched = session
            .records()
            .iter()
            .filter(|r| r.facility_name.is_some())
            .count();
        self
    }

    pub fn with_session(mut self, session: &ReconciliationSession) -> Self {
        self.manually_resolved = session.new_associations().len();
        self.excluded = session.excluded().len();
        self
    }

    pub fn with_facilities(mut self, facilities: usize) -> Self {
        self.facilities = facilities;
        self
    }

    pub fn with_output(mut self, file_name: &str) -> Self {
        self.outputs.push(file_name.to_string());
        self
    }

    pub fn finish(mut self) -> Self {
        self.ended = Local::now();
        self
    }

    pub fn log(&self) {
        let secs = (self.ended - self.started).num_milliseconds() as f64 / 1000.0;
        log::info!(
            "records: {}, references: {}, matched by key: {}, manual associations: {}, excluded: {}",
            self.records,
            self.references,
            self.auto_matched,
            self.manually_resolved,
            self.excluded
        );
        log::info!(
            "facilities: {}, files written: {} ({:.2}s)",
            self.facilities,
            self.outputs.len(),
            secs
        );
        for name in &self.outputs {
            log::info!("  {}", name);
        }
    }
}
