//! Timing defaults for resolution retries
//!
//! Passed explicitly to [`Desktop`](crate::Desktop) and
//! [`ResolutionSpec`](crate::ResolutionSpec); there is no mutable global.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_FIND_TIMEOUT: &str = "SOULDESK_FIND_TIMEOUT";
pub const ENV_FIND_RETRY: &str = "SOULDESK_FIND_RETRY";
pub const ENV_EXISTS_TIMEOUT: &str = "SOULDESK_EXISTS_TIMEOUT";
pub const ENV_EXISTS_RETRY: &str = "SOULDESK_EXISTS_RETRY";

/// Retry budget and cadence for the locator.
///
/// Durations serialize as humantime strings (`"5s"`, `"90ms"`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Budget for `resolve`/`resolve_all`/`wait_for`
    #[serde(with = "humantime_duration")]
    pub find_timeout: Duration,

    /// Sleep between resolution attempts
    #[serde(with = "humantime_duration")]
    pub find_retry: Duration,

    /// Budget for `exists`
    #[serde(with = "humantime_duration")]
    pub exists_timeout: Duration,

    #[serde(with = "humantime_duration")]
    pub exists_retry: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Timings {
    pub const fn defaults() -> Self {
        Self {
            find_timeout: Duration::from_secs(5),
            find_retry: Duration::from_millis(90),
            exists_timeout: Duration::from_millis(500),
            exists_retry: Duration::from_millis(300),
        }
    }

    /// Tight budgets for fast, local machines
    pub fn fast() -> Self {
        Self::defaults().scaled(0.2)
    }

    /// Generous budgets for slow or remote sessions
    pub fn slow() -> Self {
        Self::defaults().scaled(10.0)
    }

    /// Multiply every duration; retries never drop below one millisecond
    pub fn scaled(self, factor: f64) -> Self {
        let factor = if factor.is_finite() && factor > 0.0 { factor } else { 1.0 };
        let scale = |d: Duration| d.mul_f64(factor);
        let retry = |d: Duration| scale(d).max(Duration::from_millis(1));
        Self {
            find_timeout: scale(self.find_timeout),
            find_retry: retry(self.find_retry),
            exists_timeout: scale(self.exists_timeout),
            exists_retry: retry(self.exists_retry),
        }
    }

    /// Apply `SOULDESK_*` environment overrides; unparsable values are ignored
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    pub(crate) fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, current: Duration| -> Duration {
            match lookup(key) {
                Some(raw) => match humantime::parse_duration(raw.trim()) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!("ignoring {}={:?}: {}", key, raw, err);
                        current
                    }
                },
                None => current,
            }
        };
        self.find_timeout = read(ENV_FIND_TIMEOUT, self.find_timeout);
        self.find_retry = read(ENV_FIND_RETRY, self.find_retry);
        self.exists_timeout = read(ENV_EXISTS_TIMEOUT, self.exists_timeout);
        self.exists_retry = read(ENV_EXISTS_RETRY, self.exists_retry);
        self
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_timings() {
        let timings = Timings::default();
        assert_eq!(timings.find_timeout, Duration::from_secs(5));
        assert_eq!(timings.find_retry, Duration::from_millis(90));
        assert_eq!(timings.exists_timeout, Duration::from_millis(500));
        assert_eq!(timings.exists_retry, Duration::from_millis(300));
    }

    #[test]
    fn test_presets_scale() {
        assert!(Timings::fast().find_timeout < Timings::defaults().find_timeout);
        assert!(Timings::slow().find_timeout > Duration::from_secs(49));
        assert!(Timings::slow().exists_retry > Timings::defaults().exists_retry);
        assert_eq!(Timings::defaults().scaled(-1.0), Timings::defaults());
        assert_eq!(
            Timings::defaults().scaled(0.000_001).find_retry,
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [(ENV_FIND_TIMEOUT, "250ms"), (ENV_FIND_RETRY, "soon")]
            .into_iter()
            .collect();
        let timings =
            Timings::defaults().with_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(timings.find_timeout, Duration::from_millis(250));
        assert_eq!(timings.find_retry, Duration::from_millis(90));
    }

    #[test]
    fn test_humantime_serde() {
        let timings: Timings =
            serde_json::from_str(r#"{"find_timeout": "2s", "exists_retry": "50ms"}"#).unwrap();
        assert_eq!(timings.find_timeout, Duration::from_secs(2));
        assert_eq!(timings.exists_retry, Duration::from_millis(50));
        assert_eq!(timings.find_retry, Duration::from_millis(90));

        let json = serde_json::to_value(Timings::defaults()).unwrap();
        assert_eq!(json["find_timeout"], "5s");
        assert_eq!(json["find_retry"], "90ms");
    }
}
