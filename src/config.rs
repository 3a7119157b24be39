use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::{Cli, OutputFormat};
use crate::entry_factory::RuleOverride;
use crate::error::{ConfigError, ConfigResult as Result};
use crate::runner::DEFAULT_COMMON_FILE_PREFIX;

const APP_NAME: &str = "netex-validator";
const ENV_PREFIX: &str = "NETEX_VALIDATOR_";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub schema: SchemaConfig,
    pub references: ReferencesConfig,
    pub rules: RulesConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Number of line files validated concurrently
    pub threads: Option<usize>,
    pub skip_schema: bool,
    pub skip_validators: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SchemaConfig {
    /// XSD used as a schema gate
    pub xsd_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ReferencesConfig {
    /// Codespaces whose references are resolved outside the dataset
    pub ignored_codespaces: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RulesConfig {
    /// TOML catalog applied on top of the built-in rules
    pub catalog: Option<PathBuf>,
    /// Rule codes removed from every validator
    pub disabled: Vec<String>,
    /// Report-entry overrides keyed by rule code
    pub overrides: HashMap<String, RuleOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub verbose: bool,
    /// Verdict and errors only
    pub quiet: bool,
    /// Logs as JSON lines
    pub log_json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub extensions: Vec<String>,
    /// Glob syntax, relative to the dataset root
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub common_file_prefix: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
            common_file_prefix: DEFAULT_COMMON_FILE_PREFIX.to_string(),
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path).await?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;
        debug!(path = %path.display(), "loading configuration file");

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Find configuration file in the current directory, then the user config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            format!("{}.toml", APP_NAME),
            format!("{}.json", APP_NAME),
            format!(".{}.toml", APP_NAME),
            format!(".{}.json", APP_NAME),
        ];

        let mut candidates: Vec<PathBuf> = config_names.iter().map(PathBuf::from).collect();
        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join(APP_NAME);
            candidates.extend(config_names.iter().map(|name| app_config_dir.join(name)));
        }

        for path in candidates {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }
        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply `NETEX_VALIDATOR_*` overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(threads) = parse_env(env, "THREADS")? {
            config.validation.threads = Some(threads);
        }
        if let Some(skip_schema) = parse_env(env, "SKIP_SCHEMA")? {
            config.validation.skip_schema = skip_schema;
        }
        if let Some(skip_validators) = parse_env(env, "SKIP_VALIDATORS")? {
            config.validation.skip_validators = skip_validators;
        }

        if let Some(xsd) = env.get(&env_key("XSD")) {
            config.schema.xsd_path = Some(PathBuf::from(xsd));
        }

        if let Some(codespaces) = env.get(&env_key("IGNORED_CODESPACES")) {
            config.references.ignored_codespaces = split_list(&codespaces);
        }

        if let Some(catalog) = env.get(&env_key("RULE_CATALOG")) {
            config.rules.catalog = Some(PathBuf::from(catalog));
        }
        if let Some(disabled) = env.get(&env_key("DISABLED_RULES")) {
            config.rules.disabled = split_list(&disabled);
        }

        if let Some(verbose) = parse_env(env, "VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(quiet) = parse_env(env, "QUIET")? {
            config.output.quiet = quiet;
        }
        if let Some(log_json) = parse_env(env, "LOG_JSON")? {
            config.output.log_json = log_json;
        }
        if let Some(format) = env.get(&env_key("FORMAT")) {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormat::Human,
                "json" => OutputFormat::Json,
                "summary" => OutputFormat::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {} value: {}",
                        env_key("FORMAT"),
                        format
                    )));
                }
            };
        }

        if let Some(extensions) = env.get(&env_key("EXTENSIONS")) {
            config.files.extensions = split_list(&extensions);
        }
        if let Some(prefix) = env.get(&env_key("COMMON_FILE_PREFIX")) {
            config.files.common_file_prefix = prefix;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.threads.is_some() {
            config.validation.threads = cli.threads;
        }
        config.validation.skip_schema |= cli.skip_schema;
        config.validation.skip_validators |= cli.skip_validators;

        if let Some(xsd) = &cli.xsd {
            config.schema.xsd_path = Some(xsd.clone());
        }

        if !cli.ignored_codespaces.is_empty() {
            config.references.ignored_codespaces = cli.ignored_codespaces.clone();
        }

        if let Some(catalog) = &cli.rule_catalog {
            config.rules.catalog = Some(catalog.clone());
        }
        for code in &cli.disabled_rules {
            if !config.rules.disabled.contains(code) {
                config.rules.disabled.push(code.clone());
            }
        }

        if let Some(format) = cli.output_format {
            config.output.format = format;
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }
        config.output.log_json |= cli.log_json;

        if let Some(extensions) = cli.get_extensions() {
            config.files.extensions = extensions;
        }
        if !cli.include_patterns.is_empty() {
            config.files.include_patterns = cli.include_patterns.clone();
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }
        if let Some(prefix) = &cli.common_file_prefix {
            config.files.common_file_prefix = prefix.clone();
        }

        config
    }

    /// Merge two configurations (second takes precedence for set values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        if override_config.validation.threads.is_some() {
            base.validation.threads = override_config.validation.threads;
        }
        base.validation.skip_schema = override_config.validation.skip_schema;
        base.validation.skip_validators = override_config.validation.skip_validators;

        if override_config.schema.xsd_path.is_some() {
            base.schema.xsd_path = override_config.schema.xsd_path;
        }

        if !override_config.references.ignored_codespaces.is_empty() {
            base.references.ignored_codespaces = override_config.references.ignored_codespaces;
        }

        if override_config.rules.catalog.is_some() {
            base.rules.catalog = override_config.rules.catalog;
        }
        if !override_config.rules.disabled.is_empty() {
            base.rules.disabled = override_config.rules.disabled;
        }
        base.rules.overrides.extend(override_config.rules.overrides);

        base.output = override_config.output;

        if !override_config.files.extensions.is_empty() {
            base.files.extensions = override_config.files.extensions;
        }
        if !override_config.files.include_patterns.is_empty() {
            base.files.include_patterns = override_config.files.include_patterns;
        }
        if !override_config.files.exclude_patterns.is_empty() {
            base.files.exclude_patterns = override_config.files.exclude_patterns;
        }
        base.files.common_file_prefix = override_config.files.common_file_prefix;

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.validation.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }
        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        if config.files.common_file_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "Common file prefix must not be empty".to_string(),
            ));
        }

        if config
            .references
            .ignored_codespaces
            .iter()
            .any(|codespace| codespace.is_empty() || codespace.contains(':'))
        {
            return Err(ConfigError::Validation(
                "Ignored codespaces must be non-empty and must not contain ':'".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the effective thread count
    pub fn get_thread_count(config: &Config) -> usize {
        config.validation.threads.unwrap_or_else(num_cpus::get)
    }
}

fn env_key(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name)
}

fn parse_env<T: FromStr>(env: &impl EnvProvider, name: &str) -> Result<Option<T>> {
    let key = env_key(name);
    env.get(&key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
        })
        .transpose()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
