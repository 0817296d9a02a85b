//! Shared command plumbing: config loading, catalog connection, and
//! name parsing.

use crate::cli::GlobalArgs;
use anyhow::{bail, Context, Result};
use fx_core::{Config, QueryFilter, TableName};
use fx_db::Catalog;
use std::path::{Path, PathBuf};

/// Everything a command needs to run.
pub struct CommandContext {
    pub config: Config,
    pub fixture_root: PathBuf,
    pub catalog: Box<dyn Catalog>,
}

/// Load the config and open the configured catalog, honoring the global
/// overrides.
pub fn load_context(global: &GlobalArgs) -> Result<CommandContext> {
    let config_path = Path::new(&global.config);
    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let project_root = config_path.parent().unwrap_or_else(|| Path::new("."));

    let fixture_root = match &global.directory {
        Some(dir) => PathBuf::from(dir),
        None => config.fixture_dir_absolute(project_root),
    };

    let db_path = global
        .database
        .clone()
        .unwrap_or_else(|| config.database.path.clone());
    let catalog = fx_db::connect(config.database.engine, &db_path)
        .with_context(|| format!("Failed to connect to database at {db_path}"))?;

    if global.verbose {
        log::debug!(
            "engine={} database={db_path} fixtures={}",
            catalog.engine(),
            fixture_root.display()
        );
    }

    Ok(CommandContext {
        config,
        fixture_root,
        catalog,
    })
}

/// Parse `catalog.schema.table`, `schema.table`, or a bare table name,
/// filling missing parts from the connection's default namespace.
pub fn parse_table_name(default_namespace: &(String, String), raw: &str) -> Result<TableName> {
    let parts: Vec<&str> = raw.split('.').collect();
    let (catalog, schema) = default_namespace;
    match parts.as_slice() {
        [table] => Ok(TableName::new(catalog.as_str(), schema.as_str(), *table)),
        [schema_part, table] => Ok(TableName::new(catalog.as_str(), *schema_part, *table)),
        [catalog_part, schema_part, table] => {
            Ok(TableName::new(*catalog_part, *schema_part, *table))
        }
        _ => bail!("Invalid table name '{raw}': expected at most catalog.schema.table"),
    }
}

/// Parse a `column=value` filter argument.
pub fn parse_filter(raw: &str) -> Result<QueryFilter> {
    match raw.split_once('=') {
        Some((column, value)) if !column.is_empty() => Ok(QueryFilter::new(column, value)),
        _ => bail!("Invalid filter '{raw}': expected column=value"),
    }
}
