//! scpsync - copy locally changed or selected files to a remote host
//!
//! Files are uploaded over SFTP into `<remote home>/projects/<project>/`,
//! keeping their layout below the local project or repository root.

// Use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod cli;
pub mod commands;
pub mod config;
pub mod sftp;
pub mod source;
pub mod ssh;
pub mod sync;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log to stderr; stdout carries the output pane
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub fn run() -> ExitCode {
    let cli = cli::Cli::parse();
    init_logging();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!("scpsync {} starting", env!("CARGO_PKG_VERSION"));
    runtime.block_on(cli::execute(cli))
}
