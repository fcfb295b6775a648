//! Record timestamps.

use chrono::{DateTime, Utc};

/// Every timestamp in a record is UTC.
pub type Timestamp = DateTime<Utc>;

/// The current time.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// The latest of `timestamps`, ignoring unset ones. `None` if all are unset.
pub fn latest<I>(timestamps: I) -> Option<Timestamp>
where
    I: IntoIterator<Item = Option<Timestamp>>,
{
    timestamps.into_iter().flatten().max()
}
