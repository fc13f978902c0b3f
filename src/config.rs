use std::fmt;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::cohort::{CohortError, SettlePolicy};

/// Application-level constants
pub const APP_NAME: &str = "cgm-cohort";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BASE_URL: &str = "https://qa2.development.tidepool.org";
pub const DEFAULT_SUMMARY_WAIT_MS: u64 = 60_000;
pub const DEFAULT_DASHBOARD_CLICK_WAIT_MS: u64 = 1_000;
/// Factor applied to every count when `SCALE_DOWN_DATASET` is on.
pub const SCALE_DOWN_FACTOR: f64 = 0.1;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
/// Longest generation period a batch may request.
pub const MAX_PERIOD_LENGTH_DAYS: u32 = 90;

/// Environment variable names.
pub mod env_keys {
    pub const USERNAME: &str = "TIDEPOOL_USERNAME";
    pub const PASSWORD: &str = "TIDEPOOL_PASSWORD";
    pub const BASE_URL: &str = "TIDEPOOL_BASE_URL";
    pub const CLINIC_ID: &str = "CLINIC_ID";
    pub const TAG_ID: &str = "TAG_ID";
    pub const SETUP_DASHBOARD_DATA: &str = "SETUP_DASHBOARD_DATA";
    pub const SCALE_DOWN_DATASET: &str = "SCALE_DOWN_DATASET";
    pub const WAIT_SUMMARY_CALCULATION_FINISH: &str = "WAIT_SUMMARY_CALCULATION_FINISH";
    pub const WAIT_AFTER_DASHBOARD_CLICK: &str = "WAIT_AFTER_DASHBOARD_CLICK";
}

/// Default log filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "cgm_cohort=debug,warn"
    } else {
        "cgm_cohort=info,warn"
    }
}

// ═══════════════════════════════════════════
// Credentials
// ═══════════════════════════════════════════

/// Login for the patient collaborator. The password is wiped on drop and
/// never printed.
#[derive(Clone)]
pub struct Credentials {
    pub user_name: String,
    pub password: Zeroizing<String>,
    pub base_url: String,
}

impl Credentials {
    pub fn new(user_name: &str, password: &str, base_url: &str) -> Self {
        Self {
            user_name: user_name.to_string(),
            password: Zeroizing::new(password.to_string()),
            base_url: base_url.to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ═══════════════════════════════════════════
// ScenarioConfig
// ═══════════════════════════════════════════

/// Everything a scenario run reads from its environment, resolved once.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub credentials: Credentials,
    pub clinic_id: String,
    pub tag_id: String,
    /// Create patients before verifying; off means verify pre-existing data.
    pub setup_data: bool,
    pub scale_down: bool,
    pub summary_wait: Duration,
    pub dashboard_click_wait: Duration,
}

impl ScenarioConfig {
    /// Read from the process environment. `tag_key` is the scenario's tag
    /// variable, e.g. `TAG_SCENARIO1_ID`; `TAG_ID` is the fallback.
    pub fn from_env(tag_key: &str) -> Result<Self, CohortError> {
        Self::from_lookup(tag_key, |key| std::env::var(key).ok())
    }

    /// Read through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(tag_key: &str, lookup: F) -> Result<Self, CohortError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| CohortError::MissingConfiguration(key.to_string()))
        };

        let user_name = require(env_keys::USERNAME)?;
        let password = Zeroizing::new(require(env_keys::PASSWORD)?);
        let base_url = get(env_keys::BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let clinic_id = require(env_keys::CLINIC_ID)?;
        let tag_id = get(tag_key)
            .or_else(|| get(env_keys::TAG_ID))
            .ok_or_else(|| CohortError::MissingConfiguration(tag_key.to_string()))?;

        let flag = |key: &str| get(key).is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let millis = |key: &str, default: u64| match get(key) {
            None => Duration::from_millis(default),
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(key, value = %raw, default, "Invalid wait, using default");
                    Duration::from_millis(default)
                }
            },
        };

        Ok(Self {
            credentials: Credentials {
                user_name,
                password,
                base_url,
            },
            clinic_id,
            tag_id,
            setup_data: flag(env_keys::SETUP_DASHBOARD_DATA),
            scale_down: flag(env_keys::SCALE_DOWN_DATASET),
            summary_wait: millis(env_keys::WAIT_SUMMARY_CALCULATION_FINISH, DEFAULT_SUMMARY_WAIT_MS),
            dashboard_click_wait: millis(
                env_keys::WAIT_AFTER_DASHBOARD_CLICK,
                DEFAULT_DASHBOARD_CLICK_WAIT_MS,
            ),
        })
    }

    /// Fixed wait for the summary job, as the suite configures it.
    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy::Fixed(self.summary_wait)
    }

    pub fn scale_factor(&self) -> f64 {
        if self.scale_down {
            SCALE_DOWN_FACTOR
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("TIDEPOOL_USERNAME", "qa@example.com"),
            ("TIDEPOOL_PASSWORD", "hunter2"),
            ("CLINIC_ID", "clinic-1"),
            ("TAG_SCENARIO1_ID", "tag-s1"),
        ]
    }

    #[test]
    fn defaults_apply() {
        let cfg = ScenarioConfig::from_lookup("TAG_SCENARIO1_ID", lookup(&base())).unwrap();
        assert_eq!(cfg.credentials.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.tag_id, "tag-s1");
        assert!(!cfg.setup_data);
        assert!(!cfg.scale_down);
        assert_eq!(cfg.scale_factor(), 1.0);
        assert_eq!(cfg.summary_wait, Duration::from_millis(60_000));
        assert_eq!(cfg.dashboard_click_wait, Duration::from_millis(1_000));
    }

    #[test]
    fn flags_are_case_insensitive() {
        let mut pairs = base();
        pairs.push(("SETUP_DASHBOARD_DATA", "TRUE"));
        pairs.push(("SCALE_DOWN_DATASET", "true"));
        pairs.push(("WAIT_SUMMARY_CALCULATION_FINISH", "1500"));
        let cfg = ScenarioConfig::from_lookup("TAG_SCENARIO1_ID", lookup(&pairs)).unwrap();
        assert!(cfg.setup_data);
        assert!(cfg.scale_down);
        assert_eq!(cfg.scale_factor(), SCALE_DOWN_FACTOR);
        assert_eq!(cfg.summary_wait, Duration::from_millis(1500));
        assert_eq!(
            cfg.settle_policy(),
            SettlePolicy::Fixed(Duration::from_millis(1500))
        );
    }

    #[test]
    fn invalid_wait_falls_back() {
        let mut pairs = base();
        pairs.push(("WAIT_AFTER_DASHBOARD_CLICK", "soon"));
        let cfg = ScenarioConfig::from_lookup("TAG_SCENARIO1_ID", lookup(&pairs)).unwrap();
        assert_eq!(cfg.dashboard_click_wait, Duration::from_millis(1_000));
    }

    #[test]
    fn tag_falls_back_to_tag_id() {
        let pairs = vec![
            ("TIDEPOOL_USERNAME", "qa@example.com"),
            ("TIDEPOOL_PASSWORD", "hunter2"),
            ("CLINIC_ID", "clinic-1"),
            ("TAG_ID", "generic"),
        ];
        let cfg = ScenarioConfig::from_lookup("TAG_SCENARIO4_ID", lookup(&pairs)).unwrap();
        assert_eq!(cfg.tag_id, "generic");
    }

    #[test]
    fn other_scenario_tags_are_ignored() {
        let cfg = ScenarioConfig::from_lookup("TAG_SCENARIO3_ID", lookup(&base()));
        match cfg {
            Err(CohortError::MissingConfiguration(key)) => assert_eq!(key, "TAG_SCENARIO3_ID"),
            other => panic!("expected missing tag, got {other:?}"),
        }
    }

    #[test]
    fn blank_clinic_is_missing() {
        let mut pairs = base();
        pairs.retain(|(k, _)| *k != "CLINIC_ID");
        pairs.push(("CLINIC_ID", "   "));
        let err = ScenarioConfig::from_lookup("TAG_SCENARIO1_ID", lookup(&pairs)).unwrap_err();
        assert!(matches!(err, CohortError::MissingConfiguration(ref k) if k == "CLINIC_ID"));
    }

    #[test]
    fn debug_redacts_password() {
        let credentials = Credentials::new("qa@example.com", "hunter2", DEFAULT_BASE_URL);
        let printed = format!("{credentials:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("[REDACTED]"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
