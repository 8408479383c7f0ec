//! A/B test bucket assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted A/B group for an external key.
///
/// `Test` and `Control` are drawn once; `Removed` is the only state that may
/// supersede a previous assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Test,
    Control,
    Removed,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Control => "control",
            Self::Removed => "removed",
        }
    }

    pub const ALL: [Bucket; 3] = [Bucket::Test, Bucket::Control, Bucket::Removed];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAssignment {
    pub canonical: String,
    pub bucket: Bucket,
    pub assigned_at: DateTime<Utc>,
}

impl BucketAssignment {
    pub fn new(canonical: impl Into<String>, bucket: Bucket) -> Self {
        Self { canonical: canonical.into(), bucket, assigned_at: Utc::now() }
    }
}
