//! Config Command
//!
//! Usage:
//!   marketfit config show [-g] [-f toml|json|yaml]
//!   marketfit config path
//!   marketfit config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::{Config, ConfigLoader};
use crate::types::{MarketError, Result};

/// Print the effective configuration, or the raw global file with `global`
pub fn show(global: bool, format: &str) -> Result<()> {
    if global {
        match ConfigLoader::global_config_path() {
            Some(path) if path.exists() => {
                println!("# Global config: {}\n", path.display());
                println!("{}", std::fs::read_to_string(&path)?);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'marketfit config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
        return Ok(());
    }

    let config = ConfigLoader::load()?;
    println!("{}", render(&config, format)?);
    Ok(())
}

/// Serialize a config in the requested format. API keys are never included.
pub fn render(config: &Config, format: &str) -> Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(config)?),
        "yaml" => Ok(serde_yaml::to_string(config)?),
        "toml" | "text" => {
            toml::to_string_pretty(config).map_err(|e| MarketError::Config(e.to_string()))
        }
        other => Err(MarketError::Config(format!(
            "Unknown format '{}'. Valid values: toml, json, yaml",
            other
        ))),
    }
}

pub fn path() -> Result<()> {
    let out = Output::new();
    let exists = |p: &std::path::Path| if p.exists() { "" } else { " (missing)" };

    match ConfigLoader::global_config_path() {
        Some(global) => out.field(
            "Global",
            format!("{}{}", global.display(), exists(global.as_path())),
        ),
        None => out.field("Global", "unavailable"),
    }
    let project = ConfigLoader::project_config_path();
    out.field(
        "Project",
        format!("{}{}", project.display(), exists(project.as_path())),
    );
    out.field("Environment", "MARKETFIT_<SECTION>__<KEY>");
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let path = ConfigLoader::init(global, force)?;
    Output::new().success(&format!(
        "Initialized {} configuration",
        if global { "global" } else { "project" }
    ));
    println!("  Config: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_formats() {
        let config = Config::default();
        let toml_text = render(&config, "toml").unwrap();
        assert!(toml_text.contains("[workflow]"));

        let json: serde_json::Value = serde_json::from_str(&render(&config, "json").unwrap()).unwrap();
        assert_eq!(json["workflow"]["max_iterations"], 5);

        let yaml = render(&config, "yaml").unwrap();
        assert!(yaml.contains("fit_threshold"));

        assert!(render(&config, "xml").is_err());
    }
}
