//! Process-wide tracing setup for applications embedding the broker.
//!
//! Installs a `tracing-subscriber` fmt subscriber filtered by `RUST_LOG`
//! (default `info`). `EVENTBROKER_LOG_FORMAT=json|pretty` picks the output
//! format; JSON is the default.

/// Install the global subscriber using `RUST_LOG` and `EVENTBROKER_LOG_FORMAT`.
///
/// Later calls are no-ops once a subscriber is installed.
pub fn init() {
    tracing::init();
}

pub mod tracing;

pub use tracing::{LogFormat, init_with};
