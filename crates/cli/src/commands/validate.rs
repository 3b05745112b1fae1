//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{EngineBlueprint, WheelKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
    /// Configuration with defaults filled in, in the input format
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<String>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    wheel: WheelKind,
    revolution_teeth: u32,
    teeth_per_cycle: u32,
    teeth_per_sync: u32,
    dependent_count: usize,
    simulation: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
            resolved: None,
        };
    }

    match ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let resolved = if args.resolved {
                ConfigFormat::from_path(&args.config)
                    .and_then(|format| ConfigLoader::render(&blueprint, format))
                    .ok()
            } else {
                None
            };
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    wheel: blueprint.crank.wheel,
                    revolution_teeth: blueprint.crank.revolution_teeth(),
                    teeth_per_cycle: blueprint.crank.teeth_per_cycle,
                    teeth_per_sync: blueprint.crank.teeth_per_sync,
                    dependent_count: blueprint.links.dependents.len(),
                    simulation: blueprint.simulation.is_some(),
                }),
                resolved,
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
            resolved: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &EngineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.links.cam_channel.is_none() {
        warnings.push("No cam channel configured - the cam log is never reset".to_string());
    }

    if blueprint.host.tcr2_adjustment.is_none() {
        warnings.push(
            "host.tcr2_adjustment is not set - the scripted host never confirms sync".to_string(),
        );
    }

    if blueprint.simulation.is_none() {
        warnings.push("No [simulation] section - `run` needs --trace".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Wheel: {:?}", summary.wheel);
            println!("  Teeth per revolution: {}", summary.revolution_teeth);
            println!("  Teeth per cycle: {}", summary.teeth_per_cycle);
            println!("  Teeth per sync: {}", summary.teeth_per_sync);
            println!("  Dependents: {}", summary.dependent_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }

        if let Some(ref resolved) = result.resolved {
            println!("\n--- resolved ---\n{}", resolved);
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
