//! Command line front end for the ROM library

use clap::Parser;
use cli::{handle_cli, Cli};
use romshelf::config::{GlobalConfig, CONFIG_LOCATION};
use std::ops::Deref;

mod cli;

fn main() {
    tracing_subscriber::fmt::init();
    tracing::info!("romshelf v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config_location = cli
        .config
        .clone()
        .unwrap_or_else(|| CONFIG_LOCATION.deref().clone());
    let config = GlobalConfig::load_or_default(&config_location);

    if let Err(err) = handle_cli(cli.action, &config, &config_location) {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}
