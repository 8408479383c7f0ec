//! Poll checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last confirmed poll time, in unix seconds.
///
/// Read-modify-write is not transactional; a single active poller is assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCheckpoint {
    pub last_check: i64,
    pub recorded_at: DateTime<Utc>,
}

impl PollCheckpoint {
    pub fn at(last_check: i64) -> Self {
        Self { last_check, recorded_at: Utc::now() }
    }
}
