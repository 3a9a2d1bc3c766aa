// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use tavern::command::{self, EXIT_USAGE};
use tavern::config::{Config, LogFormat};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(EXIT_USAGE);
    }

    init_tracing(&config);
    tavern::ensure_crypto();

    let code = command::run(&config).await;
    std::process::exit(code);
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so command output on stdout stays clean.
    match config.log_format().unwrap_or_default() {
        LogFormat::Json => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        LogFormat::Text => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}
