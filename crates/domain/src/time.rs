//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for samples, proposals, backups, and evaluations.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}
