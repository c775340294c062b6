// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! casefiled - the Casefile daemon

use cf_daemon::{config::DaemonConfig, env::DaemonEnv, lifecycle::Daemon, listener};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(env: &DaemonEnv) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(env.log_dir(), "casefiled.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_new(&env.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

fn parse_args() -> Result<Option<PathBuf>, String> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = args.next().ok_or("--config requires a path")?;
                config = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                println!("usage: casefiled [--config <path>]");
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = match parse_args() {
        Ok(path) => path,
        Err(message) => {
            eprintln!("casefiled: {message}");
            return ExitCode::from(2);
        }
    };

    let env = match DaemonEnv::from_env() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("casefiled: {e}");
            return ExitCode::from(2);
        }
    };
    let _guard = init_tracing(&env);

    let config = match config_path {
        Some(path) => match DaemonConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("casefiled: config: {e}");
                return ExitCode::from(2);
            }
        },
        None => DaemonConfig::default(),
    };

    let daemon = match Daemon::start(env, config, Vec::new()).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("casefiled: {e}");
            return ExitCode::from(3);
        }
    };

    let serve = {
        let daemon = Arc::clone(&daemon);
        tokio::spawn(listener::serve(daemon))
    };

    // Run until the socket asks for shutdown or the process is signalled
    tokio::select! {
        result = serve => {
            if let Err(e) = result.unwrap_or(Ok(())) {
                error!(error = %e, "listener failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
        }
    }

    daemon.shutdown().await;
    ExitCode::SUCCESS
}
