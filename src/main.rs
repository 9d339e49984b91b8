// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! rmq-tool – moves messages between a RabbitMQ queue and a newline-delimited
//! JSON data file.
//
//  $ rmq-tool --config config.json
//  $ rmq-tool --mode dump --file dump.jsonl

use clap::Parser;
use rmq_tool::{
    config::{self, Mode},
    dump, push,
};
use std::{path::PathBuf, process::ExitCode};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "rmq-tool",
    version,
    about = "Moves messages between a RabbitMQ queue and a JSON lines data file"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Overrides the mode from the configuration file
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Overrides the data file from the configuration file
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = err.to_string(), "invalid configuration file");
            return ExitCode::from(1);
        }
    };

    if let Some(mode) = cli.mode {
        cfg.mode = mode;
    }
    if let Some(file) = cli.file {
        cfg.data_file = file;
    }

    let result = match cfg.mode {
        Mode::Dump => dump::run(&cfg).await,
        Mode::Push => push::run(&cfg).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = err.to_string(), "stopping after an unrecoverable failure");
            ExitCode::from(1)
        }
    }
}
