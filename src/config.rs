use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::WardenError;
use crate::log::LogLevel;

pub const CONFIG_FILE: &str = "plan-warden.toml";

/// Optional per-project configuration, loaded from `plan-warden.toml` at the
/// project root. Every section has defaults so a missing file (or a file
/// with only some sections) behaves identically to full defaults.
#[derive(Default, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WardenConfig {
    pub validation: ValidationSection,
    pub audit: AuditSection,
    pub log: LogSection,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ValidationSection {
    /// Default for direct runner invocations.
    pub stop_on_first_error: bool,
    /// Default for the hook layer, which prefers collect-all.
    pub hooks_stop_on_first_error: bool,
}

impl Default for ValidationSection {
    fn default() -> Self {
        ValidationSection {
            stop_on_first_error: true,
            hooks_stop_on_first_error: false,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AuditSection {
    pub enabled: bool,
    /// Agent name recorded in audit entries written by the CLI.
    pub agent: String,
}

impl Default for AuditSection {
    fn default() -> Self {
        AuditSection {
            enabled: true,
            agent: "system".to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        LogSection {
            level: "info".to_string(),
        }
    }
}

/// Load the project config, falling back to defaults when the file is absent.
pub fn load_config(project_root: &Path) -> Result<WardenConfig, WardenError> {
    let path = project_root.join(CONFIG_FILE);
    if !path.is_file() {
        return Ok(WardenConfig::default());
    }
    load_config_file(&path)
}

/// Load a config from an explicit path. Unlike `load_config`, a missing
/// file is an error here — the caller asked for this file specifically.
pub fn load_config_file(path: &Path) -> Result<WardenConfig, WardenError> {
    let contents = fs::read_to_string(path).map_err(|e| WardenError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| WardenError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Collect every field-level problem rather than failing at the first.
pub fn validate(config: &WardenConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.audit.agent.trim().is_empty() {
        errors.push("audit.agent must not be empty".to_string());
    }

    if let Err(message) = config.log.level.parse::<LogLevel>() {
        errors.push(format!("log.level: {}", message));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WardenConfig::default();
        assert!(config.validation.stop_on_first_error);
        assert!(!config.validation.hooks_stop_on_first_error);
        assert!(config.audit.enabled);
        assert_eq!(config.audit.agent, "system");
        assert_eq!(config.log.level, "info");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: WardenConfig = toml::from_str(
            r#"
            [audit]
            agent = "ci"
        "#,
        )
        .unwrap();
        assert_eq!(config.audit.agent, "ci");
        assert!(config.audit.enabled);
        assert!(config.validation.stop_on_first_error);
    }

    #[test]
    fn validate_collects_all_problems() {
        let mut config = WardenConfig::default();
        config.audit.agent = "  ".to_string();
        config.log.level = "loud".to_string();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
