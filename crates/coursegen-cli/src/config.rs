//! Configuration file management for coursegen.
//!
//! Provides a TOML-based config file at `~/.config/coursegen/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use coursegen_core::budget::{DEFAULT_CEILING_USD, DEFAULT_MODEL, ModelPrice, PriceTable};
use coursegen_core::llm::anthropic::DEFAULT_BASE_URL;

pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_CURRICULUM: &str = "config/curriculum.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_MODEL: &str = "COURSEGEN_MODEL";
pub const ENV_BUDGET: &str = "COURSEGEN_BUDGET";
pub const ENV_OUTPUT_DIR: &str = "COURSEGEN_OUTPUT_DIR";
pub const ENV_CURRICULUM: &str = "COURSEGEN_CURRICULUM";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub budget: BudgetSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub curriculum: CurriculumSection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pricing: Vec<PricingEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BudgetSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceiling_usd: Option<f64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CurriculumSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Extra or overriding price for one model, in dollars per million tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct PricingEntry {
    pub model: String,
    pub input_per_million: f64,
    pub output_per_million: f64,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the coursegen config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/coursegen` or
/// `~/.config/coursegen`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("coursegen");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("coursegen")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Serialize and write `config` to `path`, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The file may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line; `None` defers to the rest of the chain.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub curriculum: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub budget: Option<f64>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub ceiling_usd: f64,
    pub output_dir: PathBuf,
    pub curriculum_path: PathBuf,
    pub prices: PriceTable,
}

impl Settings {
    /// Resolve from the process environment and the default config file.
    /// An unreadable or absent config file counts as empty.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let path = config_path();
        let file = if path.exists() {
            Some(load_config_from(&path)?)
        } else {
            None
        };
        Self::resolve_from(overrides, |name| std::env::var(name).ok(), file)
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    pub fn resolve_from(
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
        file: Option<ConfigFile>,
    ) -> Result<Self> {
        let file = file.unwrap_or_default();

        let api_key = env(ENV_API_KEY)
            .filter(|k| !k.is_empty())
            .or(file.api.api_key);

        let model = overrides
            .model
            .clone()
            .or_else(|| env(ENV_MODEL))
            .or(file.api.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let ceiling_usd = match (overrides.budget, env(ENV_BUDGET)) {
            (Some(budget), _) => budget,
            (None, Some(raw)) => raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_BUDGET} is not a number: {raw}"))?,
            (None, None) => file.budget.ceiling_usd.unwrap_or(DEFAULT_CEILING_USD),
        };
        if !ceiling_usd.is_finite() || ceiling_usd < 0.0 {
            bail!("budget ceiling must be a non-negative amount, got {ceiling_usd}");
        }

        let output_dir = overrides
            .output_dir
            .clone()
            .or_else(|| env(ENV_OUTPUT_DIR).map(PathBuf::from))
            .or(file.output.dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let curriculum_path = overrides
            .curriculum
            .clone()
            .or_else(|| env(ENV_CURRICULUM).map(PathBuf::from))
            .or(file.curriculum.path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CURRICULUM));

        let mut prices = PriceTable::default();
        for entry in file.pricing {
            prices.insert(
                entry.model,
                ModelPrice::new(entry.input_per_million, entry.output_per_million),
            );
        }
        if prices.get(&model).is_none() {
            tracing::warn!(%model, "no price known for model; its calls will not count toward the budget");
        }

        Ok(Self {
            api_key,
            base_url: file
                .api
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
            timeout: Duration::from_secs(file.api.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            ceiling_usd,
            output_dir,
            curriculum_path,
            prices,
        })
    }

    /// The API key, for commands that call the generation service.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!(
                "API key not found; set {ENV_API_KEY} or run `coursegen init --api-key <KEY>`"
            ),
        }
    }
}

/// `sk-ant-a...wxyz` style display of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn file_with_everything() -> ConfigFile {
        ConfigFile {
            api: ApiSection {
                base_url: Some("http://localhost:8080".into()),
                model: Some("file-model".into()),
                api_key: Some("file-key".into()),
                timeout_secs: Some(60),
            },
            budget: BudgetSection {
                ceiling_usd: Some(12.5),
            },
            output: OutputSection {
                dir: Some("file-out".into()),
            },
            curriculum: CurriculumSection {
                path: Some("file-curriculum.json".into()),
            },
            pricing: vec![PricingEntry {
                model: "file-model".into(),
                input_per_million: 1.0,
                output_per_million: 2.0,
            }],
        }
    }

    #[test]
    fn defaults_when_nothing_set() {
        let settings = Settings::resolve_from(&Overrides::default(), env_of(&[]), None).unwrap();
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.ceiling_usd, DEFAULT_CEILING_USD);
        assert_eq!(settings.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(settings.curriculum_path, PathBuf::from(DEFAULT_CURRICULUM));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.timeout, Duration::from_secs(300));
        assert!(settings.api_key.is_none());
        assert!(settings.require_api_key().is_err());
    }

    #[test]
    fn config_file_overrides_defaults() {
        let settings = Settings::resolve_from(
            &Overrides::default(),
            env_of(&[]),
            Some(file_with_everything()),
        )
        .unwrap();
        assert_eq!(settings.model, "file-model");
        assert_eq!(settings.ceiling_usd, 12.5);
        assert_eq!(settings.output_dir, PathBuf::from("file-out"));
        assert_eq!(settings.api_key.as_deref(), Some("file-key"));
        assert_eq!(settings.timeout, Duration::from_secs(60));
        assert_eq!(
            settings.prices.get("file-model"),
            Some(ModelPrice::new(1.0, 2.0))
        );
        // Built-in prices survive alongside configured ones.
        assert!(settings.prices.get(DEFAULT_MODEL).is_some());
    }

    #[test]
    fn env_overrides_config_file() {
        let env = env_of(&[
            (ENV_API_KEY, "env-key"),
            (ENV_MODEL, "env-model"),
            (ENV_BUDGET, " 3.25 "),
            (ENV_OUTPUT_DIR, "env-out"),
            (ENV_CURRICULUM, "env.json"),
        ]);
        let settings =
            Settings::resolve_from(&Overrides::default(), env, Some(file_with_everything()))
                .unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("env-key"));
        assert_eq!(settings.model, "env-model");
        assert_eq!(settings.ceiling_usd, 3.25);
        assert_eq!(settings.output_dir, PathBuf::from("env-out"));
        assert_eq!(settings.curriculum_path, PathBuf::from("env.json"));
    }

    #[test]
    fn cli_flags_override_everything() {
        let overrides = Overrides {
            curriculum: Some("cli.json".into()),
            output_dir: Some("cli-out".into()),
            model: Some("cli-model".into()),
            budget: Some(1.0),
        };
        let env = env_of(&[
            (ENV_MODEL, "env-model"),
            (ENV_BUDGET, "3.25"),
            (ENV_OUTPUT_DIR, "env-out"),
        ]);
        let settings =
            Settings::resolve_from(&overrides, env, Some(file_with_everything())).unwrap();
        assert_eq!(settings.model, "cli-model");
        assert_eq!(settings.ceiling_usd, 1.0);
        assert_eq!(settings.output_dir, PathBuf::from("cli-out"));
        assert_eq!(settings.curriculum_path, PathBuf::from("cli.json"));
    }

    #[test]
    fn invalid_budget_is_an_error() {
        let err = Settings::resolve_from(
            &Overrides::default(),
            env_of(&[(ENV_BUDGET, "lots")]),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_BUDGET));

        let negative = Overrides {
            budget: Some(-1.0),
            ..Overrides::default()
        };
        assert!(Settings::resolve_from(&negative, env_of(&[]), None).is_err());
    }

    #[test]
    fn empty_env_key_falls_back_to_file() {
        let settings = Settings::resolve_from(
            &Overrides::default(),
            env_of(&[(ENV_API_KEY, "")]),
            Some(file_with_everything()),
        )
        .unwrap();
        assert_eq!(settings.require_api_key().unwrap(), "file-key");
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("coursegen").join("config.toml");

        save_config_to(&path, &file_with_everything()).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.api.model.as_deref(), Some("file-model"));
        assert_eq!(loaded.budget.ceiling_usd, Some(12.5));
        assert_eq!(loaded.curriculum.path, Some(PathBuf::from("file-curriculum.json")));
        assert_eq!(loaded.pricing.len(), 1);
        assert_eq!(loaded.pricing[0].output_per_million, 2.0);
    }

    #[test]
    fn partial_config_file_parses() {
        let config: ConfigFile = toml::from_str("[budget]\nceiling_usd = 2.0\n").unwrap();
        assert_eq!(config.budget.ceiling_usd, Some(2.0));
        assert!(config.api.model.is_none());
        assert!(config.pricing.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config_to(&path, &ConfigFile::default()).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn mask_secret_hides_the_middle() {
        assert_eq!(mask_secret("sk-ant-abcdefghijklmnop"), "sk-ant-a...mnop");
        assert_eq!(mask_secret("short"), "*****");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("coursegen/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
