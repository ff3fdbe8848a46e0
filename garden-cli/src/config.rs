use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use garden_core::VaultOptions;
use garden_core::config::{Config, LinkConfig, SiteConfig};

pub const DEFAULT_CONFIG_FILE: &str = "./garden.toml";

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GardenConfig {
    /// Where to read from and write to
    pub build: BuildConfig,
    /// Site, link and vault settings (from garden-core)
    #[serde(flatten)]
    pub site: Config,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Vault directory containing markdown notes
    pub base_dir: String,
    /// Note the walk starts from, written as index.html
    pub start_page: String,
    /// Output directory for generated site
    pub output_dir: String,
    /// Tera templates
    pub templates_dir: String,
    /// Static assets and the sass/ directory
    pub static_dir: String,
    /// Configuration file path
    pub config: String,
    /// Host for dev server
    pub host: String,
    /// Port for dev server
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_dir: "./vault".to_string(),
            start_page: "index".to_string(),
            output_dir: "./out".to_string(),
            templates_dir: "./templates".to_string(),
            static_dir: "./static".to_string(),
            config: DEFAULT_CONFIG_FILE.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
        }
    }
}

impl Default for GardenConfig {
    fn default() -> Self {
        // Tables rather than nulls so file and env sources merge key by key
        Self {
            build: BuildConfig::default(),
            site: Config {
                site: Some(SiteConfig::default()),
                links: Some(LinkConfig::default()),
                vault: Some(VaultOptions::default()),
            },
        }
    }
}

impl GardenConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (GARDEN_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = string_arg(args, "config").unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = ConfigBuilder::builder();

        builder = builder.add_source(ConfigBuilder::try_from(&Self::default())?);

        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::from(Path::new(&config_file)));
        }

        // GARDEN_BUILD__PORT=8080, GARDEN_SITE__TITLE=...
        builder = builder.add_source(
            Environment::with_prefix("GARDEN")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut cli_overrides = HashMap::new();
        for (arg, key) in [
            ("base_dir", "build.base_dir"),
            ("start_page", "build.start_page"),
            ("output_dir", "build.output_dir"),
            ("templates_dir", "build.templates_dir"),
            ("static_dir", "build.static_dir"),
            ("config", "build.config"),
            ("host", "build.host"),
        ] {
            if let Some(value) = string_arg(args, arg) {
                cli_overrides.insert(key.to_string(), value);
            }
        }
        if let Some(port) = string_arg(args, "port") {
            let port: u16 = port
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid port: {}", port))?;
            cli_overrides.insert("build.port".to_string(), port.to_string());
        }
        if args.try_get_one::<bool>("open").ok().flatten() == Some(&true) {
            cli_overrides.insert("build.open".to_string(), "true".to_string());
        }

        for (key, value) in cli_overrides {
            builder = builder.set_override(key, value)?;
        }

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

/// Only arguments defined for the running subcommand are present.
fn string_arg(args: &ArgMatches, name: &str) -> Option<String> {
    args.try_get_one::<String>(name).ok().flatten().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, Command};
    use garden_core::config::BrokenLinkPolicy;

    fn app() -> Command {
        Command::new("test")
            .arg(Arg::new("base_dir").long("base-dir"))
            .arg(Arg::new("output_dir").long("output"))
            .arg(Arg::new("config").long("config"))
    }

    #[test]
    fn test_default_config() {
        let config = GardenConfig::default();
        assert_eq!(config.build.base_dir, "./vault");
        assert_eq!(config.build.start_page, "index");
        assert_eq!(config.build.output_dir, "./out");
        assert_eq!(config.build.port, 3000);
    }

    #[test]
    fn test_cli_args_override() {
        let matches = app()
            .try_get_matches_from(vec![
                "test",
                "--base-dir",
                "/custom/vault",
                "--output",
                "/custom/output",
                "--config",
                "/no/such/garden.toml",
            ])
            .unwrap();

        let config = GardenConfig::load(&matches).unwrap();
        assert_eq!(config.build.base_dir, "/custom/vault");
        assert_eq!(config.build.output_dir, "/custom/output");
        // Should still have defaults for non-overridden values
        assert_eq!(config.build.templates_dir, "./templates");
    }

    #[test]
    fn test_config_file_layered_under_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garden.toml");
        std::fs::write(
            &path,
            r#"
[build]
start_page = "Home"
output_dir = "public"

[site]
title = "Notes"

[links]
broken = "plain"
"#,
        )
        .unwrap();

        let path = path.to_string_lossy().to_string();
        let matches = app()
            .try_get_matches_from(vec!["test", "--config", &path, "--output", "dist"])
            .unwrap();

        let config = GardenConfig::load(&matches).unwrap();
        assert_eq!(config.build.start_page, "Home");
        assert_eq!(config.build.output_dir, "dist");

        let site = config.site.site.unwrap();
        assert_eq!(site.title.as_deref(), Some("Notes"));
        assert_eq!(site.template, "index.html");
        assert_eq!(config.site.links.unwrap().broken, BrokenLinkPolicy::PlainText);
        assert!(config.site.vault.unwrap().recursive);
    }
}
