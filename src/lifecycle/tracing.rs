//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter. The
//! filter is read from `RUST_LOG` and falls back to `info`; module targets
//! are hidden because every event already carries the resource it is about.
//!
//! ```bash
//! # Phases, added and destroyed resources
//! RUST_LOG=info cargo run
//!
//! # Per-node transitions, linking and save notifications
//! RUST_LOG=debug cargo run
//! ```
//!
//! With `RUST_LOG=info` a boot of the demo plant reads like:
//!
//! ```text
//! INFO initialize: Phase changed phase=LoadResources
//! INFO initialize: Resources loaded resources=4
//! INFO initialize: Transition completed transition=initialize total=4 failed=0
//! INFO start: Transition completed transition=start total=4 failed=0
//! ```
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. A second call keeps the first one.
pub fn setup_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing already set up");
    }
}
