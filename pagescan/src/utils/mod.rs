//! Timestamp helpers shared by the record, the driver events and the logs.

pub mod timestamps;

pub use timestamps::{latest, now_utc, Timestamp};
