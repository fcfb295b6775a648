//! The result record and the aggregator that completes it.

mod aggregator;
mod phase;
mod record;

pub use aggregator::{ResultAggregator, DEFAULT_OUTPUT_KEY};
pub use phase::{Phase, TreeSource};
pub use record::{FieldUpdate, PayloadMatch, PayloadSearchResults, ResultRecord};
