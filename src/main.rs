use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use netex_validator::catalog::load_tree_builder;
use netex_validator::cli::{Cli, VerbosityLevel};
use netex_validator::config::{Config, ConfigManager};
use netex_validator::dataset::{DatasetConfig, DatasetValidator};
use netex_validator::entry_factory::ConfigurableEntryFactory;
use netex_validator::file_discovery::FileDiscovery;
use netex_validator::logging::{LoggingConfig, init_logging};
use netex_validator::output::Output;
use netex_validator::runner::ValidationOptions;
use netex_validator::validators::{
    BlockJourneyReferencesIgnorer, ExternalCodespaceIgnorer, ExternalReferenceValidator,
    InterchangeJourneyReferencesIgnorer, SchemaGate,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        return Ok(ExitCode::from(2));
    }

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;
    let verbosity = verbosity_of(&config);
    init_logging(LoggingConfig::new(verbosity, config.output.log_json))?;
    debug!(?config, "configuration loaded");

    let tree = load_tree_builder(config.rules.catalog.as_deref(), &config.rules.disabled)
        .context("Failed to load the rule catalog")?
        .build()
        .context("Invalid rule catalog")?;

    let mut external_validators: Vec<Arc<dyn ExternalReferenceValidator>> = vec![
        Arc::new(BlockJourneyReferencesIgnorer),
        Arc::new(InterchangeJourneyReferencesIgnorer),
    ];
    if !config.references.ignored_codespaces.is_empty() {
        external_validators.push(Arc::new(ExternalCodespaceIgnorer::new(
            config.references.ignored_codespaces.iter().cloned(),
        )));
    }

    let schema_gate = load_schema_gate(&config)?;
    let entry_factory = Arc::new(ConfigurableEntryFactory::new(config.rules.overrides.clone()));
    let dataset_config = DatasetConfig {
        max_concurrent_validations: ConfigManager::get_thread_count(&config),
        options: ValidationOptions {
            skip_schema: config.validation.skip_schema,
            skip_validators: config.validation.skip_validators,
        },
    };

    let validator = DatasetValidator::in_memory(
        Arc::new(tree),
        external_validators,
        dataset_config,
        |builder| {
            let builder = builder
                .with_entry_factory(entry_factory)
                .with_common_file_prefix(config.files.common_file_prefix.clone())
                .with_disabled_rules(config.rules.disabled.iter().cloned());
            match schema_gate {
                Some(gate) => builder.with_schema_gate(gate),
                None => builder,
            }
        },
    );

    let output = Output::new(verbosity, config.output.format);

    if cli.list_rules {
        print!("{}", output.format_rules(&validator.runner().rules())?);
        return Ok(ExitCode::SUCCESS);
    }

    let path = cli.path.as_deref().context("A dataset path is required")?;
    let codespace = cli.codespace.as_deref().context("A codespace is required")?;

    let discovery = FileDiscovery::new()
        .with_extensions(config.files.extensions.clone())
        .with_include_patterns(config.files.include_patterns.clone())?
        .with_exclude_patterns(config.files.exclude_patterns.clone())?;

    info!(codespace, path = %path.display(), "validating dataset");
    let results = validator
        .validate_path(codespace, path, &discovery)
        .await
        .with_context(|| format!("Validation of {} aborted", path.display()))?;

    print!("{}", output.format_results(&results)?);

    if results.report.has_error() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn verbosity_of(config: &Config) -> VerbosityLevel {
    if config.output.quiet {
        VerbosityLevel::Quiet
    } else if config.output.verbose {
        VerbosityLevel::Verbose
    } else {
        VerbosityLevel::Normal
    }
}

#[cfg(feature = "xsd")]
fn load_schema_gate(config: &Config) -> Result<Option<Arc<dyn SchemaGate>>> {
    use netex_validator::validators::schema::XsdSchemaGate;

    let Some(path) = &config.schema.xsd_path else {
        return Ok(None);
    };
    let gate: Arc<dyn SchemaGate> = Arc::new(XsdSchemaGate::from_file(path)?);
    Ok(Some(gate))
}

#[cfg(not(feature = "xsd"))]
fn load_schema_gate(config: &Config) -> Result<Option<Arc<dyn SchemaGate>>> {
    if let Some(path) = &config.schema.xsd_path {
        anyhow::bail!(
            "XSD validation against {} requires building with the `xsd` feature",
            path.display()
        );
    }
    Ok(None)
}
