use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, error, info};

use garden_dev_server::{LiveServer, LiveServerConfig, Reloader, livereload_script};

use super::build::add_build_args;
use super::build_site;
use crate::config::GardenConfig;

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Build, serve and rebuild on changes with live reload")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on [default: 3000]"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to [default: 127.0.0.1]"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(clap::ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = GardenConfig::load(args)?;
    let build = &config.build;
    let script = livereload_script(&build.host, build.port);

    let report = build_site(&config, Some(script.clone()))?;
    info!("Initial build: {} pages", report.pages_rendered());

    let server = LiveServer::new(LiveServerConfig {
        host: build.host.clone(),
        port: build.port,
        root: PathBuf::from(&build.output_dir),
        open: build.open,
    });
    let reloader = server.reloader();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Dev server error: {}", e);
        }
    });

    let watcher_config = config.clone();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watch_sources(watcher_config, script, reloader).await {
            error!("Source watcher error: {}", e);
        }
    });

    let _ = tokio::try_join!(server_handle, watcher_handle)?;

    Ok(())
}

/// Directories and files whose changes trigger a rebuild.
struct Sources {
    dirs: Vec<PathBuf>,
    config_file: PathBuf,
    output_dir: PathBuf,
}

impl Sources {
    fn new(config: &GardenConfig) -> Self {
        let build = &config.build;
        Self {
            dirs: [&build.base_dir, &build.templates_dir, &build.static_dir]
                .into_iter()
                .map(|d| absolute(Path::new(d)))
                .collect(),
            config_file: absolute(Path::new(&build.config)),
            output_dir: absolute(Path::new(&build.output_dir)),
        }
    }

    fn is_source_change(&self, path: &Path) -> bool {
        let path = absolute(path);
        // Output may live inside the vault; writing it must not loop
        if path.starts_with(&self.output_dir) {
            return false;
        }
        path == self.config_file || self.dirs.iter().any(|d| path.starts_with(d))
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Rebuild on every source change and reload browsers after each success.
async fn watch_sources(config: GardenConfig, script: String, reloader: Reloader) -> Result<()> {
    let sources = Sources::new(&config);
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut debouncer = new_debouncer(
        Duration::from_millis(500),
        move |res: DebounceEventResult| {
            if let Ok(events) = res {
                for event in events {
                    let _ = tx.blocking_send(event.path);
                }
            }
        },
    )?;

    for dir in &sources.dirs {
        if dir.exists() {
            debouncer
                .watcher()
                .watch(dir, notify::RecursiveMode::Recursive)?;
            info!("Watching {}", dir.display());
        }
    }
    if sources.config_file.exists() {
        debouncer
            .watcher()
            .watch(&sources.config_file, notify::RecursiveMode::NonRecursive)?;
        info!("Watching config file: {}", sources.config_file.display());
    }

    while let Some(path) = rx.recv().await {
        if !sources.is_source_change(&path) {
            debug!("Skipping non-source change: {}", path.display());
            continue;
        }
        info!("Source changed: {}", path.display());

        // Drain the rest of this burst so one save means one rebuild
        while rx.try_recv().is_ok() {}

        let config = config.clone();
        let script = script.clone();
        let result = tokio::task::spawn_blocking(move || build_site(&config, Some(script))).await?;
        match result {
            Ok(report) => {
                info!("Site rebuilt: {} pages", report.pages_rendered());
                reloader.reload();
            }
            Err(e) => error!("Build error: {:#}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_changes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["vault", "vault/out", "templates"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }

        let mut config = GardenConfig::default();
        let path = |p: &str| root.join(p).to_string_lossy().to_string();
        config.build.base_dir = path("vault");
        config.build.output_dir = path("vault/out");
        config.build.templates_dir = path("templates");
        config.build.static_dir = path("static");
        config.build.config = path("garden.toml");

        let sources = Sources::new(&config);
        assert!(sources.is_source_change(&root.join("vault/note.md")));
        assert!(sources.is_source_change(&root.join("templates/index.html")));
        assert!(sources.is_source_change(&root.join("static/sass/main.scss")));
        assert!(sources.is_source_change(&root.join("garden.toml")));
        assert!(!sources.is_source_change(&root.join("vault/out/index.html")));
        assert!(!sources.is_source_change(&root.join("elsewhere.txt")));
    }
}
