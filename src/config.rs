use std::time::Duration;

/// Which audio backend the app talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cpal,
    Dummy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeConfig {
    pub backend: BackendKind,
    /// Length of the zero baseline and x-range of every sub-plot.
    pub trace_len: usize,
    /// How long shutdown waits for an in-flight callback to drain.
    pub shutdown_grace: Duration,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Cpal,
            trace_len: 1024,
            shutdown_grace: Duration::from_millis(100),
        }
    }
}

impl ScopeConfig {
    /// Reads `SCOPE_BACKEND`, `SCOPE_TRACE_LEN` and `SCOPE_SHUTDOWN_GRACE_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("SCOPE_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "cpal" => config.backend = BackendKind::Cpal,
                "dummy" => config.backend = BackendKind::Dummy,
                other => log::warn!("Ignoring unknown SCOPE_BACKEND '{other}'"),
            }
        }
        if let Some(v) = lookup("SCOPE_TRACE_LEN") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => config.trace_len = n,
                _ => log::warn!("Ignoring invalid SCOPE_TRACE_LEN '{v}'"),
            }
        }
        if let Some(v) = lookup("SCOPE_SHUTDOWN_GRACE_MS") {
            match v.parse::<u64>() {
                Ok(ms) => config.shutdown_grace = Duration::from_millis(ms),
                Err(_) => log::warn!("Ignoring invalid SCOPE_SHUTDOWN_GRACE_MS '{v}'"),
            }
        }
        config
    }
}
