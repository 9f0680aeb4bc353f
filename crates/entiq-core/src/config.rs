//! Runtime configuration shared by the registry, dispatcher, and database layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which initialization strategy a `Database` uses when none is set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializerKind {
    CreateIfNotExists,
    DropCreateAlways,
    DropCreateIfModelChanges,
    None,
}

impl FromStr for InitializerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create_if_not_exists" => Ok(InitializerKind::CreateIfNotExists),
            "drop_create_always" => Ok(InitializerKind::DropCreateAlways),
            "drop_create_if_model_changes" => Ok(InitializerKind::DropCreateIfModelChanges),
            "none" | "null" => Ok(InitializerKind::None),
            other => Err(Error::Config(format!("unknown initializer '{}'", other))),
        }
    }
}

impl fmt::Display for InitializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InitializerKind::CreateIfNotExists => "create_if_not_exists",
            InitializerKind::DropCreateAlways => "drop_create_always",
            InitializerKind::DropCreateIfModelChanges => "drop_create_if_model_changes",
            InitializerKind::None => "none",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntiqConfig {
    /// Resolve every catalog operator when the registry is built instead of on first use.
    pub eager_registry: bool,

    /// Strategy for `Database::initialize` when the caller does not pick one.
    pub default_initializer: InitializerKind,

    /// Command timeout forwarded to the store, in seconds. `None` keeps the provider default.
    pub command_timeout_secs: Option<u64>,

    /// Connection identity used when a context does not name one.
    pub default_connection: String,
}

impl Default for EntiqConfig {
    fn default() -> Self {
        Self {
            eager_registry: true,
            default_initializer: InitializerKind::CreateIfNotExists,
            command_timeout_secs: None,
            default_connection: "memory://default".to_string(),
        }
    }
}

impl EntiqConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `ENTIQ_EAGER_REGISTRY`: `true`/`false`
    /// - `ENTIQ_DEFAULT_INITIALIZER`: `create_if_not_exists`, `drop_create_always`,
    ///   `drop_create_if_model_changes` or `none`
    /// - `ENTIQ_COMMAND_TIMEOUT_SECS`: non-negative integer
    /// - `ENTIQ_DEFAULT_CONNECTION`: connection identity
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env`, reading through `lookup` so tests need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(s) = lookup("ENTIQ_EAGER_REGISTRY") {
            if let Ok(v) = s.trim().parse::<bool>() {
                cfg.eager_registry = v;
            }
        }

        if let Some(s) = lookup("ENTIQ_DEFAULT_INITIALIZER") {
            if let Ok(v) = s.parse::<InitializerKind>() {
                cfg.default_initializer = v;
            }
        }

        if let Some(s) = lookup("ENTIQ_COMMAND_TIMEOUT_SECS") {
            if let Ok(v) = s.trim().parse::<u64>() {
                cfg.command_timeout_secs = Some(v);
            }
        }

        if let Some(s) = lookup("ENTIQ_DEFAULT_CONNECTION") {
            if !s.trim().is_empty() {
                cfg.default_connection = s;
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("ENTIQ_EAGER_REGISTRY", "false"),
            ("ENTIQ_DEFAULT_INITIALIZER", "drop_create_always"),
            ("ENTIQ_COMMAND_TIMEOUT_SECS", "30"),
        ]
        .into_iter()
        .collect();
        let cfg = EntiqConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert!(!cfg.eager_registry);
        assert_eq!(cfg.default_initializer, InitializerKind::DropCreateAlways);
        assert_eq!(cfg.command_timeout_secs, Some(30));
        assert_eq!(cfg.default_connection, "memory://default");
    }

    #[test]
    fn unparseable_values_fall_back() {
        let cfg = EntiqConfig::from_lookup(|k| match k {
            "ENTIQ_EAGER_REGISTRY" => Some("maybe".into()),
            "ENTIQ_COMMAND_TIMEOUT_SECS" => Some("-5".into()),
            "ENTIQ_DEFAULT_INITIALIZER" => Some("sometimes".into()),
            _ => None,
        });
        assert_eq!(cfg, EntiqConfig::default());
    }

    #[test]
    fn initializer_kind_round_trips_through_display() {
        for kind in [
            InitializerKind::CreateIfNotExists,
            InitializerKind::DropCreateAlways,
            InitializerKind::DropCreateIfModelChanges,
            InitializerKind::None,
        ] {
            assert_eq!(kind.to_string().parse::<InitializerKind>().unwrap(), kind);
        }
    }
}
