//! Minimal binary entry point.
//!
//! The CLI surface, HTTP API, and model transport are external
//! collaborators; this binary only demonstrates wiring: initialize tracing,
//! load config, and print readiness. A real deployment embeds
//! [`codeframe::ReactAgent`] behind its own command/API layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber, respecting `RUST_LOG`.
/// No-op (quiet) if `RUST_LOG` is unset, so embedding a release binary
/// doesn't pollute stdout by default.
pub fn init_tracing() {
    if let Ok(filter) = std::env::var("RUST_LOG") {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    }
}

fn main() {
    init_tracing();

    let config = codeframe::Config::default();
    tracing::info!(
        max_iterations = config.agent.max_iterations,
        context_window_tokens = config.compaction.context_window_tokens,
        "codeframe core ready"
    );
    println!("codeframe core ready (max_iterations={})", config.agent.max_iterations);
}
