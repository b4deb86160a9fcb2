//! Environment-driven switches for config-file permission handling.

use serde::{Deserialize, Serialize};

/// Skip locking down (and checking) the config file's mode.
pub const ENV_SKIP_MODE: &str = "KSM_CONFIG_SKIP_MODE";
/// Keep checking access but never warn about an over-permissive mode.
pub const ENV_SKIP_MODE_WARNING: &str = "KSM_CONFIG_SKIP_MODE_WARNING";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub skip_mode: bool,
    pub skip_mode_warning: bool,
}

impl ModeConfig {
    /// Read both switches from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read both switches through an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map_or(false, |v| parse_bool_flag(key, &v));
        Self {
            skip_mode: flag(ENV_SKIP_MODE),
            skip_mode_warning: flag(ENV_SKIP_MODE_WARNING),
        }
    }
}

/// `strtobool`-style truth value. Unrecognised values count as false.
fn parse_bool_flag(key: &str, value: &str) -> bool {
    match value.trim().to_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => true,
        "n" | "no" | "f" | "false" | "off" | "0" => false,
        other => {
            log::warn!("Ignoring {}={:?}: expected a boolean", key, other);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ModeConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ModeConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_to_false() {
        assert_eq!(config_from(&[]), ModeConfig::default());
    }

    #[test]
    fn truthy_values() {
        for v in ["TRUE", "true", "Yes", "y", "t", "on", "1"] {
            assert!(config_from(&[(ENV_SKIP_MODE, v)]).skip_mode, "{}", v);
        }
    }

    #[test]
    fn falsy_and_garbage_values() {
        for v in ["FALSE", "no", "off", "0", "maybe", ""] {
            assert!(!config_from(&[(ENV_SKIP_MODE, v)]).skip_mode, "{}", v);
        }
    }

    #[test]
    fn switches_are_independent() {
        let cfg = config_from(&[(ENV_SKIP_MODE_WARNING, "true")]);
        assert!(!cfg.skip_mode);
        assert!(cfg.skip_mode_warning);
    }
}
