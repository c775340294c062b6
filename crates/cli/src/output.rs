// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI results.

use cf_core::Job;
use cf_daemon::PoolStatus;
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_job(format: OutputFormat, job: &Job) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(job).unwrap_or_else(|_| "{}".into())
            );
        }
        OutputFormat::Text => {
            println!("job       {}", job.id);
            println!("pool      {}", job.pool);
            println!("status    {}", job.status);
            println!("priority  {}", job.priority);
            println!(
                "attempts  {} (requeues {}/{})",
                job.attempts, job.worker_requeue_count, job.max_worker_requeues
            );
            if let Some(worker) = &job.claimed_by {
                println!("worker    {worker}");
            }
            if let Some(error) = &job.error {
                let class = job
                    .error_class
                    .map(|c| format!(" [{c}]"))
                    .unwrap_or_default();
                println!("error{class}     {error}");
            }
        }
    }
}

pub fn print_pools(format: OutputFormat, pools: &[PoolStatus]) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(pools).unwrap_or_else(|_| "[]".into())
            );
        }
        OutputFormat::Text => {
            println!(
                "{:<12} {:<12} {:>8} {:>8} {:>8}",
                "POOL", "TIER", "WORKERS", "PENDING", "MAXCONC"
            );
            for pool in pools {
                println!(
                    "{:<12} {:<12} {:>8} {:>8} {:>8}",
                    pool.name,
                    pool.resource_tier,
                    pool.live_workers,
                    pool.pending,
                    pool.max_concurrency
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
