use chrono::Duration;
use serde::Deserialize;

/// Longest expiry window accepted anywhere: ten years.
pub const MAX_EXPIRY_HOURS: u32 = 24 * 365 * 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Lifetime of a request created without an explicit deadline.
    /// Set via HITL_DEFAULT_EXPIRY_HOURS. Default: 24.
    pub default_expiry_hours: u32,
    /// Queue items waiting longer than this are `medium`.
    /// Set via HITL_MEDIUM_PRIORITY_AFTER_HOURS. Default: 4.
    pub medium_priority_after_hours: u32,
    /// Queue items waiting longer than this are `high`.
    /// Set via HITL_HIGH_PRIORITY_AFTER_HOURS. Default: 12.
    pub high_priority_after_hours: u32,
    /// Capacity of the audit event broadcast channel.
    /// Set via HITL_EVENT_BUFFER. Default: 256.
    pub event_buffer: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_expiry_hours: 24,
            medium_priority_after_hours: 4,
            high_priority_after_hours: 12,
            event_buffer: 256,
        }
    }
}

impl ManagerConfig {
    pub fn default_expiry(&self) -> Duration {
        Duration::hours(i64::from(self.default_expiry_hours))
    }

    pub fn medium_priority_after(&self) -> Duration {
        Duration::hours(i64::from(self.medium_priority_after_hours))
    }

    pub fn high_priority_after(&self) -> Duration {
        Duration::hours(i64::from(self.high_priority_after_hours))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_expiry_hours == 0 {
            anyhow::bail!("default_expiry_hours must be greater than zero");
        }
        if self.default_expiry_hours > MAX_EXPIRY_HOURS {
            anyhow::bail!(
                "default_expiry_hours ({}) exceeds the maximum of {}",
                self.default_expiry_hours,
                MAX_EXPIRY_HOURS
            );
        }
        if self.medium_priority_after_hours > self.high_priority_after_hours {
            anyhow::bail!(
                "medium_priority_after_hours ({}) exceeds high_priority_after_hours ({})",
                self.medium_priority_after_hours,
                self.high_priority_after_hours
            );
        }
        if self.event_buffer == 0 {
            anyhow::bail!("event_buffer must be greater than zero");
        }
        Ok(())
    }
}

pub fn load() -> anyhow::Result<ManagerConfig> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from any key lookup. Unparsable values fall back to defaults.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<ManagerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = ManagerConfig::default();
    let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse().ok());

    let cfg = ManagerConfig {
        default_expiry_hours: parsed("HITL_DEFAULT_EXPIRY_HOURS")
            .unwrap_or(defaults.default_expiry_hours),
        medium_priority_after_hours: parsed("HITL_MEDIUM_PRIORITY_AFTER_HOURS")
            .unwrap_or(defaults.medium_priority_after_hours),
        high_priority_after_hours: parsed("HITL_HIGH_PRIORITY_AFTER_HOURS")
            .unwrap_or(defaults.high_priority_after_hours),
        event_buffer: lookup("HITL_EVENT_BUFFER")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.event_buffer),
    };
    cfg.validate()?;
    Ok(cfg)
}
