use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use tracing::info;

use super::build_site;
use crate::config::GardenConfig;

/// Path arguments shared by `build` and `serve`.
///
/// No defaults here, so unset flags fall through to env and the config file.
pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("base_dir")
                .short('b')
                .long("base-dir")
                .value_name("DIR")
                .help("Vault directory containing markdown notes [default: ./vault]"),
        )
        .arg(
            Arg::new("start_page")
                .short('s')
                .long("start-page")
                .value_name("NAME")
                .help("Note to start from, published as index.html [default: index]"),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for generated site [default: ./out]"),
        )
        .arg(
            Arg::new("templates_dir")
                .short('t')
                .long("templates")
                .value_name("DIR")
                .help("Template directory [default: ./templates]"),
        )
        .arg(
            Arg::new("static_dir")
                .long("static")
                .value_name("DIR")
                .help("Static assets, stylesheets under sass/ [default: ./static]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./garden.toml]"),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the static site from the vault")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = GardenConfig::load(args)?;

    let report = build_site(&config, None)?;

    info!(
        "Site built successfully in {} ({} pages, {} broken links)",
        config.build.output_dir,
        report.pages_rendered(),
        report.broken_links().len()
    );

    Ok(())
}
