use std::time::Duration;

use tracing::warn;

/// Protocol configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Name used in log lines
    pub name: String,
    /// Deadline for one outbound call; `None` waits indefinitely
    pub call_timeout_ms: Option<u64>,
    /// Longest accepted frame for framed transports
    pub max_frame_len: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            name: "ferry".to_string(),
            call_timeout_ms: None,
            max_frame_len: 1024 * 1024,
        }
    }
}

impl ProtocolConfig {
    /// Defaults overridden by `FERRY_PROTOCOL_NAME` and `FERRY_CALL_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(name) = lookup("FERRY_PROTOCOL_NAME") {
            config.name = name;
        }
        if let Some(raw) = lookup("FERRY_CALL_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.call_timeout_ms = None,
                Ok(ms) => config.call_timeout_ms = Some(ms),
                Err(err) => warn!("Ignoring FERRY_CALL_TIMEOUT_MS={:?}: {}", raw, err),
            }
        }
        config
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}
