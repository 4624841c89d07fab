//! Configuration for the agent core.
//!
//! Holds the tunables the ReAct loop, compactor, event publisher, and
//! verification gate are constructed with. Loading a config *file* from
//! disk is a host-binary concern; this module only owns the `Config` type,
//! its defaults, and env-var overrides that are part of the engine's own
//! contract (`CODEFRAME_REACT_COMPACT_THRESHOLD`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub compaction: CompactionConfig,

    #[serde(default)]
    pub events: EventConfig,

    #[serde(default)]
    pub gates: GateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            compaction: CompactionConfig::default(),
            events: EventConfig::default(),
            gates: GateConfig::default(),
        }
    }
}

/// Tunables for the ReAct loop itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_max_verification_retries")]
    pub max_verification_retries: usize,
    #[serde(default = "default_max_fix_turns")]
    pub max_fix_turns: usize,
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_verification_retries: default_max_verification_retries(),
            max_fix_turns: default_max_fix_turns(),
            step_timeout_secs: default_step_timeout(),
        }
    }
}

fn default_max_iterations() -> usize {
    30
}
fn default_max_verification_retries() -> usize {
    5
}
fn default_max_fix_turns() -> usize {
    5
}
fn default_step_timeout() -> u64 {
    300
}

/// Tunables for the conversation compactor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_context_window_tokens")]
    pub context_window_tokens: usize,
    #[serde(default = "default_compaction_threshold")]
    pub threshold: f64,
    #[serde(default = "default_preserve_recent_pairs")]
    pub preserve_recent_pairs: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            context_window_tokens: default_context_window_tokens(),
            threshold: default_compaction_threshold(),
            preserve_recent_pairs: default_preserve_recent_pairs(),
        }
    }
}

fn default_context_window_tokens() -> usize {
    200_000
}
fn default_compaction_threshold() -> f64 {
    0.85
}
fn default_preserve_recent_pairs() -> usize {
    5
}

const COMPACT_THRESHOLD_MIN: f64 = 0.5;
const COMPACT_THRESHOLD_MAX: f64 = 0.95;

impl CompactionConfig {
    /// Applies the `CODEFRAME_REACT_COMPACT_THRESHOLD` override, clamped to
    /// `[0.5, 0.95]`. Invalid or unparseable values fall back to the
    /// configured default rather than erroring.
    pub fn with_env_override(mut self) -> Self {
        if let Ok(raw) = std::env::var("CODEFRAME_REACT_COMPACT_THRESHOLD") {
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    self.threshold = v.clamp(COMPACT_THRESHOLD_MIN, COMPACT_THRESHOLD_MAX);
                }
                _ => {
                    tracing::warn!(
                        value = %raw,
                        "invalid CODEFRAME_REACT_COMPACT_THRESHOLD, falling back to default"
                    );
                }
            }
        }
        self
    }
}

/// Tunables for the event publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    #[serde(default = "default_subscriber_queue_size")]
    pub subscriber_queue_size: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_size: default_subscriber_queue_size(),
        }
    }
}

fn default_subscriber_queue_size() -> usize {
    1000
}

/// Per-gate timeouts, in seconds, for the verification stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_pytest_timeout")]
    pub pytest_timeout_secs: u64,
    #[serde(default = "default_ruff_timeout")]
    pub ruff_timeout_secs: u64,
    #[serde(default = "default_mypy_timeout")]
    pub mypy_timeout_secs: u64,
    #[serde(default = "default_npm_test_timeout")]
    pub npm_test_timeout_secs: u64,
    #[serde(default = "default_npm_lint_timeout")]
    pub npm_lint_timeout_secs: u64,
    #[serde(default = "default_single_file_lint_timeout")]
    pub single_file_lint_timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            pytest_timeout_secs: default_pytest_timeout(),
            ruff_timeout_secs: default_ruff_timeout(),
            mypy_timeout_secs: default_mypy_timeout(),
            npm_test_timeout_secs: default_npm_test_timeout(),
            npm_lint_timeout_secs: default_npm_lint_timeout(),
            single_file_lint_timeout_secs: default_single_file_lint_timeout(),
        }
    }
}

fn default_pytest_timeout() -> u64 {
    300
}
fn default_ruff_timeout() -> u64 {
    60
}
fn default_mypy_timeout() -> u64 {
    120
}
fn default_npm_test_timeout() -> u64 {
    300
}
fn default_npm_lint_timeout() -> u64 {
    120
}
fn default_single_file_lint_timeout() -> u64 {
    30
}
