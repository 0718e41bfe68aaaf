use crate::error::ConfigError;
use crate::tasks::SyncConfig;
use std::env;

const DEFAULT_USER_ID: &str = "demo-user";
const DEFAULT_CHANNEL_ID: &str = "general";
const DEFAULT_NOTIFY_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub user_id: String,
    pub channel_id: String,
    pub coalesce_notifications: bool,
    pub notification_buffer: usize,
}

impl Config {
    /// Reads `POLL_*` variables from the environment. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let coalesce_notifications = match lookup("POLL_SYNC_COALESCE") {
            Some(value) => parse_flag("POLL_SYNC_COALESCE", &value)?,
            None => true,
        };

        let notification_buffer = match lookup("POLL_NOTIFY_BUFFER") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "POLL_NOTIFY_BUFFER",
                        value,
                    });
                }
            },
            None => DEFAULT_NOTIFY_BUFFER,
        };

        Ok(Self {
            user_id: lookup("POLL_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            channel_id: lookup("POLL_CHANNEL_ID").unwrap_or_else(|| DEFAULT_CHANNEL_ID.to_string()),
            coalesce_notifications,
            notification_buffer,
        })
    }

    pub fn sync(&self) -> SyncConfig {
        SyncConfig {
            coalesce: self.coalesce_notifications,
        }
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.user_id, "demo-user");
        assert_eq!(config.channel_id, "general");
        assert!(config.coalesce_notifications);
        assert_eq!(config.notification_buffer, 64);
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = config(&[
            ("POLL_USER_ID", "alice"),
            ("POLL_CHANNEL_ID", "random"),
            ("POLL_SYNC_COALESCE", "off"),
            ("POLL_NOTIFY_BUFFER", "8"),
        ])
        .unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.channel_id, "random");
        assert_eq!(config.sync(), SyncConfig { coalesce: false });
        assert_eq!(config.notification_buffer, 8);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            config(&[("POLL_SYNC_COALESCE", "maybe")]),
            Err(ConfigError::InvalidValue { key: "POLL_SYNC_COALESCE", .. })
        ));
        assert!(matches!(
            config(&[("POLL_NOTIFY_BUFFER", "0")]),
            Err(ConfigError::InvalidValue { key: "POLL_NOTIFY_BUFFER", .. })
        ));
    }
}
