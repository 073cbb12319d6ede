//! # lull-config
//!
//! Layered configuration for the `lull` tools.
//!
//! ## Layers
//! 1. Built-in defaults
//! 2. `config/lull.yaml`
//! 3. `config/<LULL_ENV>.yaml` (`LULL_ENV` defaults to `production`)
//! 4. `LULL_*` environment variables, `__` separating nested keys, e.g.
//!    `LULL_NET__CONNECT_TIMEOUT=250ms`
//!
//! Timeouts accept the same strings as [`lull_core::Timeout`]'s `FromStr`,
//! or a bare integer of milliseconds.

#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod net;
mod telemetry;
mod timer;
mod validation;

pub use error::ConfigError;
pub use net::NetConfig;
pub use telemetry::TelemetryConfig;
pub use timer::TimerConfig;

const BASE_FILE: &str = "config/lull.yaml";
const ENV_PREFIX: &str = "LULL_";

#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
#[serde(default)]
pub struct LullConfig {
    #[validate(nested)]
    pub timer: TimerConfig,

    #[validate(nested)]
    pub net: NetConfig,

    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl LullConfig {
    /// Loads defaults, the config files present under `config/` and the
    /// environment, then validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(LullConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        } else {
            eprintln!("{BASE_FILE} not found, using default configuration");
        }

        let env = std::env::var("LULL_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{env}.yaml");
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::finish(figment)
    }

    /// Loads defaults, then `path`, then the environment.
    ///
    /// Unlike [`LullConfig::load`], a missing file is an error.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment =
            Figment::from(Serialized::defaults(LullConfig::default())).merge(Yaml::file(path));
        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use lull_core::Timeout;
    use lull_timer::ClockId;

    // Jail serialises tests that touch the process environment and cwd
    fn load() -> figment::Result<LullConfig> {
        LullConfig::load().map_err(|e| e.to_string().into())
    }

    #[test]
    fn defaults_validate() {
        let config = LullConfig::default();
        config.validate().expect("default config should validate");
        assert_eq!(config.timer.clock, ClockId::Monotonic);
        assert_eq!(config.net.connect_timeout, Timeout::from_secs(5));
    }

    #[test]
    fn load_without_files_gives_defaults() {
        Jail::expect_with(|_jail| {
            assert_eq!(load()?, LullConfig::default());
            Ok(())
        });
    }

    #[test]
    fn files_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/lull.yaml",
                "timer:\n  clock: boottime\n  default_period: 250ms\nnet:\n  backlog: 16\n",
            )?;
            jail.create_file("config/staging.yaml", "net:\n  backlog: 32\n")?;
            jail.set_env("LULL_ENV", "staging");
            jail.set_env("LULL_NET__CONNECT_TIMEOUT", "forever");
            jail.set_env("LULL_TELEMETRY__JSON", "true");

            let config = load()?;
            assert_eq!(config.timer.clock, ClockId::Boottime);
            assert_eq!(config.timer.default_period, Timeout::from_millis(250));
            assert_eq!(config.net.backlog, 32);
            assert!(config.net.connect_timeout.is_forever());
            assert!(config.telemetry.json);
            assert_eq!(config.telemetry.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn bare_integers_are_millis() {
        Jail::expect_with(|jail| {
            jail.set_env("LULL_NET__CONNECT_TIMEOUT", "1500");
            assert_eq!(load()?.net.connect_timeout, Timeout::from_millis(1500));
            Ok(())
        });
    }

    #[test]
    fn missing_path_is_reported() {
        Jail::expect_with(|jail| {
            let missing = jail.directory().join("nope.yaml");
            match LullConfig::load_from_path(&missing) {
                Err(ConfigError::FileNotFound(path)) => assert_eq!(path, missing),
                other => panic!("expected FileNotFound, got {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn load_from_path_fills_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "telemetry:\n  log_level: debug\n")?;

            let config = LullConfig::load_from_path("custom.yaml").map_err(|e| e.to_string())?;
            assert_eq!(config.telemetry.log_level, "debug");
            assert_eq!(config.net, NetConfig::default());
            assert_eq!(config.timer, TimerConfig::default());
            Ok(())
        });
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "bad.yaml",
                "timer:\n  default_period: forever\nnet:\n  backlog: 0\ntelemetry:\n  log_level: loud\n",
            )?;

            let err = match LullConfig::load_from_path("bad.yaml") {
                Err(err) => err,
                Ok(config) => panic!("expected validation error, got {config:?}"),
            };
            let ConfigError::Validation(errors) = &err else {
                panic!("expected validation error, got {err:?}");
            };
            let errors = errors.errors();
            assert!(errors.contains_key("timer"));
            assert!(errors.contains_key("net"));
            assert!(errors.contains_key("telemetry"));
            let message = err.to_string();
            assert!(message.starts_with("Invalid configuration"));
            assert!(message.contains("timer.default_period"), "{message}");
            assert!(message.contains("net.backlog"), "{message}");
            assert!(message.contains("telemetry.log_level"), "{message}");
            Ok(())
        });
    }

    #[test]
    fn malformed_timeout_is_a_parse_error() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.yaml", "net:\n  connect_timeout: soon\n")?;
            assert!(matches!(
                LullConfig::load_from_path("bad.yaml"),
                Err(ConfigError::Parsing(_))
            ));
            Ok(())
        });
    }
}
