//! Registry configuration.

/// Environment variable toggling history recording (`true`/`false`).
pub const ENV_HISTORY_ENABLED: &str = "EVENTBROKER_HISTORY_ENABLED";
/// Environment variable bounding history per event (`0` = unbounded).
pub const ENV_HISTORY_CAPACITY: &str = "EVENTBROKER_HISTORY_CAPACITY";
/// Environment variable selecting the failure policy (`propagate`/`isolate`).
pub const ENV_FAILURE_POLICY: &str = "EVENTBROKER_FAILURE_POLICY";

/// How `publish` treats a subscriber that panics.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The panic unwinds to the publisher and later subscribers are skipped.
    #[default]
    Propagate,
    /// The panic is caught and logged; remaining subscribers still run.
    Isolate,
}

impl core::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(Self::Propagate),
            "isolate" => Ok(Self::Isolate),
            other => Err(format!("unknown failure policy: {other}")),
        }
    }
}

/// Delivery history settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Record an entry per successful publish.
    pub enabled: bool,
    /// Maximum entries kept per event; oldest are evicted first. `0` = unbounded.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1_000,
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    pub history: HistoryConfig,
    pub failure_policy: FailurePolicy,
}

impl RegistryConfig {
    /// Load configuration from `EVENTBROKER_*` environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let enabled = lookup(ENV_HISTORY_ENABLED)
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(defaults.history.enabled);
        let capacity = lookup(ENV_HISTORY_CAPACITY)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults.history.capacity);
        let failure_policy = lookup(ENV_FAILURE_POLICY)
            .and_then(|v| v.parse::<FailurePolicy>().ok())
            .unwrap_or(defaults.failure_policy);

        Self {
            history: HistoryConfig { enabled, capacity },
            failure_policy,
        }
    }

    pub fn with_history(mut self, enabled: bool) -> Self {
        self.history.enabled = enabled;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history.capacity = capacity;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}
