use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;

/// Monthly sequences for human-facing numbers: `CLM-202610-00001`,
/// `BATCH-202610-0001`
pub struct NumberSequence {
    counters: DashMap<String, u64>,
}

impl NumberSequence {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    pub fn next(&self, prefix: &str, at: DateTime<Utc>, width: usize) -> String {
        let period = format!("{:04}{:02}", at.year(), at.month());
        let key = format!("{}-{}", prefix, period);
        let value = {
            let mut counter = self.counters.entry(key.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        format!("{}-{:0width$}", key, value, width = width)
    }
}

impl Default for NumberSequence {
    fn default() -> Self {
        Self::new()
    }
}
