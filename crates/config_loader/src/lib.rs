//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON engine configurations, reporting the failing line
//! - Validate wheel geometry, link channels and host parameters
//! - Render a blueprint back with defaults filled in
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Wheel: {:?}", blueprint.crank.wheel);
//! ```

mod parser;
mod validator;

pub use contracts::EngineBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Engine configuration loader
///
/// Parses, then validates: a blueprint handed out by this type is always one the
/// engine can run.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load an engine configuration; the format follows the file extension.
    ///
    /// # Errors
    /// Parse and read errors name the file. Validation errors name the first
    /// offending field, e.g. `crank.gap_ratio`.
    pub fn load_from_path(path: &Path) -> Result<EngineBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path).map_err(|e| in_file(path, e))?;
        let content = std::fs::read_to_string(path).map_err(|e| ContractError::ConfigParse {
            message: format!("{}: cannot read config: {e}", path.display()),
            source: Some(Box::new(e)),
        })?;
        let blueprint = parser::parse(&content, format).map_err(|e| in_file(path, e))?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Load from a string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<EngineBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Render a blueprint with every default spelled out
    pub fn render(
        blueprint: &EngineBlueprint,
        format: ConfigFormat,
    ) -> Result<String, ContractError> {
        parser::render(blueprint, format)
    }
}

/// Prefix a parse error with the file it came from
fn in_file(path: &Path, error: ContractError) -> ContractError {
    match error {
        ContractError::ConfigParse { message, source } => ContractError::ConfigParse {
            message: format!("{}: {message}", path.display()),
            source,
        },
        other => other,
    }
}
