//! Configuration system for reviews
//!
//! Reads configuration from `.lintelrc.yaml` / `.lintelrc.yml` /
//! `.lintelrc.json`. A configuration may `extend` presets or other
//! configuration files; the extending file takes precedence.

use crate::fixer::{FixMode, ReviewOptions};
use crate::hash::ContextHash;
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names searched by [`ReviewConfig::load_default`], in order
pub const CONFIG_FILE_NAMES: [&str; 3] = [".lintelrc.yaml", ".lintelrc.yml", ".lintelrc.json"];

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How many fixes a review applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixModeConfig {
    #[default]
    Disabled,
    First,
    Bounded,
    All,
}

impl std::str::FromStr for FixModeConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disabled" | "off" => Ok(FixModeConfig::Disabled),
            "first" => Ok(FixModeConfig::First),
            "bounded" => Ok(FixModeConfig::Bounded),
            "all" => Ok(FixModeConfig::All),
            _ => Err(format!("Unknown fix mode: {}", s)),
        }
    }
}

/// Fix settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    pub mode: FixModeConfig,

    /// Maximum number of fixes in `bounded` mode
    pub max: Option<usize>,
}

/// Rule configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,

    /// Enabled rules (empty = all)
    pub enabled: Vec<String>,

    /// Glob patterns whose diagnostics are dropped, by rule name
    pub ignore: HashMap<String, Vec<String>>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Presets or configuration files to extend
    pub extends: Vec<String>,

    pub fix: FixConfig,

    /// Run the data extraction stage of rules that have one
    pub extract: bool,

    pub rules: RulesConfig,
}

impl ReviewConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a preset configuration by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "recommended" => Some(Self::default()),
            "fix" => Some(Self {
                fix: FixConfig {
                    mode: FixModeConfig::All,
                    max: None,
                },
                ..Self::default()
            }),
            "fix-one" => Some(Self {
                fix: FixConfig {
                    mode: FixModeConfig::First,
                    max: None,
                },
                ..Self::default()
            }),
            _ => None,
        }
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_depth(path, 0)
    }

    /// Load with recursion depth limit (to prevent infinite loops)
    fn load_with_depth(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        const MAX_DEPTH: usize = 10;
        if depth >= MAX_DEPTH {
            return Err(ConfigError::Invalid(
                "Maximum config inheritance depth exceeded".to_string(),
            ));
        }

        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        if !config.extends.is_empty() {
            let base_dir = path.parent().unwrap_or(Path::new("."));
            let mut base_config = Self::default();

            for extend in &config.extends {
                let extended = match Self::preset(extend) {
                    Some(preset) => preset,
                    None => {
                        let extend_path = if Path::new(extend).is_absolute() {
                            PathBuf::from(extend)
                        } else {
                            base_dir.join(extend)
                        };
                        Self::load_with_depth(&extend_path, depth + 1)?
                    }
                };
                base_config.merge(extended);
            }

            base_config.merge(config);
            config = base_config;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load the first configuration file found in `dir`, or the defaults
    pub fn load_default(dir: &Path) -> Result<Self, ConfigError> {
        for name in &CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                log::debug!("Loading configuration from {}", path.display());
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        // Extends are not inherited

        if other.fix.mode != FixModeConfig::Disabled {
            self.fix.mode = other.fix.mode;
        }
        if other.fix.max.is_some() {
            self.fix.max = other.fix.max;
        }
        if other.extract {
            self.extract = true;
        }

        self.rules.disabled.extend(other.rules.disabled);
        if !other.rules.enabled.is_empty() {
            self.rules.enabled = other.rules.enabled;
        }
        for (rule, patterns) in other.rules.ignore {
            self.rules.ignore.entry(rule).or_default().extend(patterns);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fix.mode == FixModeConfig::Bounded && self.fix.max.is_none() {
            return Err(ConfigError::Invalid(
                "fix mode `bounded` needs `max`".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_name: &str) -> bool {
        if self.rules.disabled.iter().any(|name| name == rule_name) {
            return false;
        }
        self.rules.enabled.is_empty() || self.rules.enabled.iter().any(|name| name == rule_name)
    }

    /// Fix mode described by the configuration
    pub fn fix_mode(&self) -> FixMode {
        match self.fix.mode {
            FixModeConfig::Disabled => FixMode::Disabled,
            FixModeConfig::First => FixMode::FirstOnly,
            FixModeConfig::Bounded => FixMode::Bounded(self.fix.max.unwrap_or(0)),
            FixModeConfig::All => match self.fix.max {
                Some(max) => FixMode::Bounded(max),
                None => FixMode::Unbounded,
            },
        }
    }

    /// Review options described by the configuration
    pub fn options(&self) -> ReviewOptions {
        let options = ReviewOptions::new().with_fix_mode(self.fix_mode());
        if self.extract {
            options.with_data_extraction()
        } else {
            options
        }
    }

    /// Keep the enabled rules and attach their ignore patterns
    pub fn apply(&self, rules: Vec<Rule>) -> Vec<Rule> {
        rules
            .into_iter()
            .filter(|rule| self.is_rule_enabled(rule.name()))
            .map(|rule| match self.rules.ignore.get(rule.name()) {
                Some(patterns) => {
                    let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
                    rule.ignore_errors_for_globs(&patterns)
                }
                None => rule,
            })
            .collect()
    }

    /// Fingerprint of the configuration
    ///
    /// Hosts keeping rules (and their caches) around should start over when
    /// this changes.
    pub fn hash(&self) -> ContextHash {
        let mut ignore: Vec<(&String, &Vec<String>)> = self.rules.ignore.iter().collect();
        ignore.sort();
        ContextHash::of_serializable(&(
            &self.fix,
            self.extract,
            &self.rules.disabled,
            &self.rules.enabled,
            ignore,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Diagnostic;
    use crate::schema::ProjectRuleSchema;
    use std::fs;
    use tempfile::TempDir;

    fn rule(name: &str) -> Rule {
        let schema = ProjectRuleSchema::<u32, ()>::new(name, 0)
            .with_readme_visitor(|_, _| vec![Diagnostic::global("m", ["d"])]);
        Rule::from_project_schema(schema)
    }

    #[test]
    fn test_default_config() {
        let config = ReviewConfig::new();
        assert_eq!(config.fix_mode(), FixMode::Disabled);
        assert!(!config.options().extract_data);
        assert!(config.is_rule_enabled("any-rule"));
    }

    #[test]
    fn test_fix_mode_from_str() {
        assert_eq!("first".parse::<FixModeConfig>(), Ok(FixModeConfig::First));
        assert_eq!("ALL".parse::<FixModeConfig>(), Ok(FixModeConfig::All));
        assert!("sometimes".parse::<FixModeConfig>().is_err());
    }

    #[test]
    fn test_rule_enabled() {
        let mut config = ReviewConfig::new();

        config.rules.disabled.push("NoDebug".to_string());
        assert!(!config.is_rule_enabled("NoDebug"));
        assert!(config.is_rule_enabled("NoUnused.Exports"));

        config.rules.enabled = vec!["NoUnused.Exports".to_string()];
        assert!(!config.is_rule_enabled("Simplify"));
        assert!(config.is_rule_enabled("NoUnused.Exports"));
    }

    #[test]
    fn test_yaml_deserialize() {
        let yaml = r#"
fix:
  mode: bounded
  max: 3
extract: true
rules:
  disabled:
    - NoDebug
  ignore:
    NoUnused.Exports:
      - "src/Generated/**"
"#;

        let config: ReviewConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.fix_mode(), FixMode::Bounded(3));
        assert!(config.options().extract_data);
        assert_eq!(config.rules.disabled, vec!["NoDebug".to_string()]);
        assert_eq!(config.rules.ignore["NoUnused.Exports"].len(), 1);
    }

    #[test]
    fn test_load_with_extends() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "rules:\n  disabled: [NoDebug]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(".lintelrc.json"),
            r#"{"extends": ["fix", "base.yaml"], "rules": {"disabled": ["Simplify"]}}"#,
        )
        .unwrap();

        let config = ReviewConfig::load_default(dir.path()).unwrap();
        assert_eq!(config.fix_mode(), FixMode::Unbounded);
        assert!(!config.is_rule_enabled("NoDebug"));
        assert!(!config.is_rule_enabled("Simplify"));
        assert!(config.is_rule_enabled("NoUnused.Exports"));
    }

    #[test]
    fn test_load_rejects_cyclic_extends() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yaml"), "extends: [b.yaml]\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "extends: [a.yaml]\n").unwrap();

        let result = ReviewConfig::load(&dir.path().join("a.yaml"));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "fix = 1").unwrap();
        assert!(matches!(
            ReviewConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));

        let path = dir.path().join("broken.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(ReviewConfig::load(&path), Err(ConfigError::Json(_))));

        let path = dir.path().join("bounded.yaml");
        fs::write(&path, "fix:\n  mode: bounded\n").unwrap();
        assert!(matches!(
            ReviewConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            ReviewConfig::load(&dir.path().join("missing.yaml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_load_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = ReviewConfig::load_default(dir.path()).unwrap();
        assert_eq!(config, ReviewConfig::default());
    }

    #[test]
    fn test_apply_filters_and_ignores() {
        let mut config = ReviewConfig::new();
        config.rules.disabled.push("NoDebug".to_string());
        config
            .rules
            .ignore
            .insert("Simplify".to_string(), vec!["src/Vendor/**".to_string()]);

        let rules = config.apply(vec![rule("NoDebug"), rule("Simplify")]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name(), "Simplify");
        assert!(rules[0].exceptions().is_ignored_path("src/Vendor/Json.elm"));
        assert!(!rules[0].exceptions().is_ignored_path("src/Main.elm"));
    }

    #[test]
    fn test_hash_changes_with_config() {
        let config = ReviewConfig::new();
        let mut other = config.clone();
        assert_eq!(config.hash(), other.hash());

        other.extract = true;
        assert_ne!(config.hash(), other.hash());
    }
}
