//! Process-wide defaults for stack capture and formatting.
//!
//! Every read of global policy goes through [`config()`]; every write goes
//! through [`set_config()`] or [`update_config()`]. Readers never block: the
//! current [`Config`] lives behind an [`ArcSwap`] and a load is a pointer read.
//!
//! ## Defaults
//!
//! | Setting | Default |
//! |---------|---------|
//! | `stack_policy` | [`StackPolicy::Development`] |
//! | `capture_stacks` | `true` |
//! | `keep_runtime_frames` | `false` |
//! | `show_severity` | `false` |
//! | `max_stack_frames` | `32` |

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;

use crate::stack::StackPolicy;

/// Invalid configuration input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Global formatting and stack policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How resolved frames are presented.
    pub stack_policy: StackPolicy,
    /// Whether root layers capture a program-counter trace at all.
    pub capture_stacks: bool,
    /// Keep standard-library and runtime frames when resolving.
    pub keep_runtime_frames: bool,
    /// Prefix the outermost rendering with `[SEVERITY] ` when a severity resolves.
    pub show_severity: bool,
    /// Cap on presented frames.
    pub max_stack_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_policy: StackPolicy::Development,
            capture_stacks: true,
            keep_runtime_frames: false,
            show_severity: false,
            max_stack_frames: 32,
        }
    }
}

impl Config {
    /// Build a config from `FAULTLINE_*` environment variables, starting from defaults.
    ///
    /// - `FAULTLINE_STACK_POLICY` = `development` | `production` | `strict`
    /// - `FAULTLINE_CAPTURE_STACKS` = `true` | `false`
    /// - `FAULTLINE_KEEP_RUNTIME_FRAMES` = `true` | `false`
    /// - `FAULTLINE_SHOW_SEVERITY` = `true` | `false`
    /// - `FAULTLINE_MAX_STACK_FRAMES` = integer
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Some(v) = lookup("FAULTLINE_STACK_POLICY") {
            config.stack_policy = v.parse()?;
        }
        if let Some(v) = lookup("FAULTLINE_CAPTURE_STACKS") {
            config.capture_stacks = parse_bool("FAULTLINE_CAPTURE_STACKS", &v)?;
        }
        if let Some(v) = lookup("FAULTLINE_KEEP_RUNTIME_FRAMES") {
            config.keep_runtime_frames = parse_bool("FAULTLINE_KEEP_RUNTIME_FRAMES", &v)?;
        }
        if let Some(v) = lookup("FAULTLINE_SHOW_SEVERITY") {
            config.show_severity = parse_bool("FAULTLINE_SHOW_SEVERITY", &v)?;
        }
        if let Some(v) = lookup("FAULTLINE_MAX_STACK_FRAMES") {
            config.max_stack_frames =
                v.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "FAULTLINE_MAX_STACK_FRAMES",
                        value: v.clone(),
                    })?;
        }
        Ok(config)
    }
}

fn parse_bool(key: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: v.to_string(),
        }),
    }
}

// ============================================================================
// Registry
// ============================================================================

static CONFIG: LazyLock<ArcSwap<Config>> =
    LazyLock::new(|| ArcSwap::from_pointee(Config::default()));

/// Current global configuration.
#[inline]
pub fn config() -> Arc<Config> {
    CONFIG.load_full()
}

/// Replace the global configuration.
pub fn set_config(config: Config) {
    CONFIG.store(Arc::new(config));
}

/// Atomically update the global configuration.
///
/// `f` may run more than once if another thread updates concurrently.
pub fn update_config(f: impl Fn(&mut Config)) {
    CONFIG.rcu(|current| {
        let mut next = Config::clone(current);
        f(&mut next);
        next
    });
}
