#![allow(unused_crate_dependencies)] // false positives because there is both a library and a binary

#[macro_use]
extern crate tracing;

use std::io::Write as _;

use anyhow::Context as _;
use dvcman::ChannelManager;
use dvcman_cli::config::Config;
use dvcman_cli::report::{self, LoadReport};

fn main() -> anyhow::Result<()> {
    let config = Config::parse_args().context("CLI arguments parsing")?;

    setup_logging(config.log_file.as_deref()).context("unable to initialize logging")?;

    let mut manager = ChannelManager::with_config(config.manager.clone());
    let mut loads = Vec::with_capacity(config.plugins.len());

    for plugin in &config.plugins {
        let result = manager.load_plugin(plugin);

        if let Err(error) = &result {
            error!(plugin = %plugin, error = %error.report(), "Failed to load DVC plugin");

            if config.strict {
                anyhow::bail!("failed to load {plugin}: {}", error.report());
            }
        }

        loads.push(LoadReport::new(plugin.as_str(), result));
    }

    debug!("Initialize DVC plugins");
    manager.initialize();

    let rendered = report::render(&loads, &manager);
    std::io::stdout()
        .write_all(rendered.as_bytes())
        .context("failed to write report")?;

    debug!("Free DVC manager");
    manager.free();

    Ok(())
}

fn setup_logging(log_file: Option<&str>) -> anyhow::Result<()> {
    use std::fs::OpenOptions;

    use tracing::metadata::LevelFilter;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var("DVCMAN_LOG")
        .from_env_lossy();

    let fmt_layer = tracing_subscriber::fmt::layer().compact();

    let fmt_layer = if let Some(log_file) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("couldn't open {log_file}"))?;

        fmt_layer.with_ansi(false).with_writer(file).boxed()
    } else {
        fmt_layer.with_writer(std::io::stderr).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .context("failed to set tracing global subscriber")?;

    Ok(())
}
