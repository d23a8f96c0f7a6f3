use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::Operation;
use crate::retry::RetryPolicy;

const ONE_HOUR: Duration = Duration::from_secs(3600);

/// Per-operation deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub create: Duration,
    #[serde(with = "humantime_serde")]
    pub read: Duration,
    #[serde(with = "humantime_serde")]
    pub update: Duration,
    #[serde(with = "humantime_serde")]
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: ONE_HOUR,
            read: ONE_HOUR,
            update: ONE_HOUR,
            delete: ONE_HOUR,
        }
    }
}

impl Timeouts {
    pub fn for_operation(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read | Operation::Import => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// These timeouts with any per-resource overrides applied.
    pub fn overlay(&self, overrides: &TimeoutOverrides) -> Self {
        Self {
            create: overrides.create.unwrap_or(self.create),
            read: overrides.read.unwrap_or(self.read),
            update: overrides.update.unwrap_or(self.update),
            delete: overrides.delete.unwrap_or(self.delete),
        }
    }
}

/// The `timeouts` block of a resource declaration. Unset entries inherit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutOverrides {
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub create: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub read: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub update: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub delete: Option<Duration>,
}

/// Runtime knobs shared by every resource operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub timeouts: Timeouts,
    pub schema_retry: RetryPolicy,
    pub user_type_delete_retry: RetryPolicy,
    /// Concurrent resource operations during apply and refresh.
    pub parallelism: usize,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            schema_retry: RetryPolicy::schema(),
            user_type_delete_retry: RetryPolicy::user_type_delete(),
            parallelism: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_what_they_set() {
        let overrides: TimeoutOverrides =
            serde_json::from_str(r#"{"create": "30m", "delete": "90s"}"#).unwrap();
        let t = Timeouts::default().overlay(&overrides);
        assert_eq!(t.create, Duration::from_secs(1800));
        assert_eq!(t.delete, Duration::from_secs(90));
        assert_eq!(t.read, ONE_HOUR);
        assert_eq!(t.for_operation(Operation::Import), ONE_HOUR);
    }

    #[test]
    fn settings_parse_humantime() {
        let settings: ProviderSettings = serde_json::from_str(
            r#"{"parallelism": 4, "timeouts": {"update": "5m"}}"#,
        )
        .unwrap();
        assert_eq!(settings.parallelism, 4);
        assert_eq!(settings.timeouts.update, Duration::from_secs(300));
        assert_eq!(settings.timeouts.create, ONE_HOUR);
        assert_eq!(settings.schema_retry, RetryPolicy::schema());
    }
}
