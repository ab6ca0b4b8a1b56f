//! Millisecond-timestamp ids.

use chrono::Utc;

/// Issues ids from the wall clock in milliseconds, bumping past the last id
/// when the clock has not advanced.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        let now = Utc::now().timestamp_millis();
        self.last = now.max(self.last + 1);
        self.last.to_string()
    }
}
