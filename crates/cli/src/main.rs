// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! casefile - CLI for the Casefile document-intelligence runtime
//!
//! Exit codes: 0 success, 1 transient failure, 2 configuration or usage
//! error, 3 unrecoverable.

mod client;
mod output;

use clap::{Parser, Subcommand};
use client::{ClientError, DaemonClient};
use cf_core::ErrorClass;
use cf_daemon::{Request, Response};
use cf_host::Method;
use output::OutputFormat;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "casefile",
    version,
    about = "Casefile - document-intelligence job runtime"
)]
struct Cli {
    /// Data root (defaults to $DATA_ROOT, then ".")
    #[arg(long, global = true, value_name = "DIR")]
    data_root: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a worker draining a pool
    Worker {
        #[arg(long)]
        pool: String,
    },
    /// Submit a job to a pool
    Enqueue {
        #[arg(long)]
        pool: String,
        /// JSON payload
        #[arg(long)]
        payload: String,
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    /// Show a job record
    Status { job_id: String },
    /// List registered pools and worker counts
    Pools,
    /// Ingest a file into the document pipeline
    Ingest { file: String },
    /// Reset a job's requeue budget and re-pend it
    Requeue { job_id: String },
    /// Tail the session event log
    Events {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Daemon control
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },
    /// Route an API request through the daemon
    Api {
        /// GET, POST, or DELETE
        method: String,
        path: String,
        /// JSON body
        #[arg(long, default_value = "null")]
        body: String,
    },
}

#[derive(Subcommand)]
enum DaemonCommands {
    /// Check daemon liveness
    Status,
    /// Ask the daemon to shut down
    Stop,
}

fn data_root(cli: &Cli) -> PathBuf {
    cli.data_root
        .clone()
        .or_else(|| std::env::var("DATA_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Exit code for a failed interaction, per the error taxonomy.
fn failure_code(class: ErrorClass) -> ExitCode {
    match class {
        ErrorClass::Transient | ErrorClass::Resource => ExitCode::from(1),
        ErrorClass::Payload => ExitCode::from(2),
        ErrorClass::Stage | ErrorClass::Poison => ExitCode::from(3),
    }
}

async fn send(client: &DaemonClient, request: Request) -> Result<Response, ExitCode> {
    match client.request(request).await {
        Ok(response) => Ok(response),
        Err(e @ ClientError::Unreachable { .. }) => {
            eprintln!("casefile: {e}");
            Err(ExitCode::from(1))
        }
        Err(e) => {
            eprintln!("casefile: {e}");
            Err(ExitCode::from(3))
        }
    }
}

fn unexpected(response: Response) -> ExitCode {
    match response {
        Response::Error { class, message } => {
            eprintln!("casefile: {message}");
            failure_code(class)
        }
        other => {
            eprintln!("casefile: unexpected response: {other:?}");
            ExitCode::from(3)
        }
    }
}

async fn run(cli: Cli) -> ExitCode {
    let socket = data_root(&cli).join("casefiled.sock");
    let client = DaemonClient::new(&socket);
    let format = cli.output;

    let result = match cli.command {
        Commands::Worker { pool } => match send(&client, Request::WorkerStart { pool }).await {
            Ok(Response::WorkerStarted { worker_id, pool }) => {
                println!("worker {worker_id} started on pool {pool}");
                ExitCode::SUCCESS
            }
            Ok(other) => unexpected(other),
            Err(code) => code,
        },

        Commands::Enqueue {
            pool,
            payload,
            priority,
        } => {
            let payload: serde_json::Value = match serde_json::from_str(&payload) {
                Ok(value) => value,
                Err(e) => {
                    eprintln!("casefile: invalid payload JSON: {e}");
                    return ExitCode::from(2);
                }
            };
            match send(
                &client,
                Request::Enqueue {
                    pool,
                    payload,
                    priority,
                },
            )
            .await
            {
                Ok(Response::Job { job }) => {
                    println!("{}", job.id);
                    ExitCode::SUCCESS
                }
                Ok(other) => unexpected(other),
                Err(code) => code,
            }
        }

        Commands::Status { job_id } => {
            match send(&client, Request::JobStatus { id: job_id }).await {
                Ok(Response::Job { job }) => {
                    output::print_job(format, &job);
                    ExitCode::SUCCESS
                }
                Ok(Response::JobNotFound { id }) => {
                    eprintln!("casefile: job not found: {id}");
                    ExitCode::from(2)
                }
                Ok(other) => unexpected(other),
                Err(code) => code,
            }
        }

        Commands::Pools => match send(&client, Request::Pools).await {
            Ok(Response::Pools { pools }) => {
                output::print_pools(format, &pools);
                ExitCode::SUCCESS
            }
            Ok(other) => unexpected(other),
            Err(code) => code,
        },

        Commands::Ingest { file } => match send(&client, Request::Ingest { path: file }).await {
            Ok(Response::Ingested {
                document_id,
                job_id,
                existing,
            }) => {
                if existing {
                    println!("{document_id} (already ingested)");
                } else {
                    println!(
                        "{document_id} (extract job {})",
                        job_id.unwrap_or_default()
                    );
                }
                ExitCode::SUCCESS
            }
            Ok(other) => unexpected(other),
            Err(code) => code,
        },

        Commands::Requeue { job_id } => {
            match send(&client, Request::Requeue { id: job_id }).await {
                Ok(Response::Job { job }) => {
                    output::print_job(format, &job);
                    ExitCode::SUCCESS
                }
                Ok(other) => unexpected(other),
                Err(code) => code,
            }
        }

        Commands::Events { limit } => match send(&client, Request::Events { limit }).await {
            Ok(Response::Events { events }) => {
                for event in events {
                    println!("{}", event.log_summary());
                }
                ExitCode::SUCCESS
            }
            Ok(other) => unexpected(other),
            Err(code) => code,
        },

        Commands::Daemon { command } => match command {
            DaemonCommands::Status => match send(&client, Request::Ping).await {
                Ok(Response::Pong { version }) => {
                    println!("casefiled {version} up");
                    ExitCode::SUCCESS
                }
                Ok(other) => unexpected(other),
                Err(code) => code,
            },
            DaemonCommands::Stop => match send(&client, Request::Shutdown).await {
                Ok(Response::ShuttingDown) => {
                    println!("casefiled stopping");
                    ExitCode::SUCCESS
                }
                Ok(other) => unexpected(other),
                Err(code) => code,
            },
        },

        Commands::Api { method, path, body } => {
            let method = match method.to_ascii_uppercase().as_str() {
                "GET" => Method::Get,
                "POST" => Method::Post,
                "DELETE" => Method::Delete,
                other => {
                    eprintln!("casefile: unsupported method: {other}");
                    return ExitCode::from(2);
                }
            };
            let body: serde_json::Value = match serde_json::from_str(&body) {
                Ok(value) => value,
                Err(e) => {
                    eprintln!("casefile: invalid body JSON: {e}");
                    return ExitCode::from(2);
                }
            };
            match send(&client, Request::Api { method, path, body }).await {
                Ok(Response::Api { status, body }) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&body).unwrap_or_default()
                    );
                    if (200..300).contains(&status) {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(1)
                    }
                }
                Ok(other) => unexpected(other),
                Err(code) => code,
            }
        }
    };

    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    run(cli).await
}
