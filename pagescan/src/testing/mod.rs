//! Testing utilities for pagescan pipelines.
//!
//! This module provides:
//! - A scripted browser driver
//! - Failing and stalled stores, failing parsers, for error paths
//! - Page fixtures covering every extraction source

mod fixtures;
mod mocks;

pub use fixtures::{api_payloads, cyclic_window_state, full_page_driver, PRODUCT_PAGE, RENDERED_PRODUCT_PAGE};
pub use mocks::{FailingParsers, FailingStore, ScriptedDriver, StalledStore};
