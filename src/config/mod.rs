//! Configuration system for Superloop.
//!
//! One YAML document per loop describes the phase sequence, the runner for
//! each phase, retry and stuck-detection limits, completion gates and the
//! token price table.

use std::path::{Path, PathBuf};

use eyre::{Context, Result};

pub use self::gates::{ApprovalGateConfig, ChecklistGateConfig, EvidenceGateConfig, GatesConfig, TestsGateConfig};
pub use self::loop_config::{
    DEFAULT_PROMISE, DEFAULT_STATE_DIR, LoopConfig, RetryConfig, StuckConfig, default_phases,
    default_rate_limit_signatures,
};
pub use self::runner_spec::{DEFAULT_OUTPUT_TEMPLATE, RunnerSpec};

mod gates;
mod loop_config;
mod runner_spec;

/// Project config file names, relative to the repository root.
pub const PROJECT_CONFIG_FILES: &[&str] = &["superloop.yml", ".superloop/config.yml"];

/// Load configuration from the standard search paths.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. superloop.yml, then .superloop/config.yml in the repository root
/// 3. ~/.config/superloop/superloop.yml (user config)
/// 4. Default values
pub fn load_config(explicit_path: Option<&PathBuf>, repo_root: &Path) -> Result<LoopConfig> {
    if let Some(path) = explicit_path {
        return LoopConfig::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
    }

    for name in PROJECT_CONFIG_FILES {
        let candidate = repo_root.join(name);
        if candidate.exists() {
            match LoopConfig::load_from_file(&candidate) {
                Ok(config) => {
                    log::info!("Loaded config from {}", candidate.display());
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", candidate.display(), e);
                }
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user_config = config_dir.join("superloop").join("superloop.yml");
        if user_config.exists() {
            match LoopConfig::load_from_file(&user_config) {
                Ok(config) => {
                    log::info!("Loaded config from {}", user_config.display());
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", user_config.display(), e);
                }
            }
        }
    }

    log::info!("No config file found, using defaults");
    Ok(LoopConfig::default())
}
