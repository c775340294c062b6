// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool dispatcher: stage → pool placement with admission control.
//!
//! Unknown pools, pools that have been worker-less past the staleness
//! threshold, and tier cross-placement all surface as typed errors at
//! enqueue time so callers can degrade instead of hanging.

use crate::directory::WorkerDirectory;
use cf_broker::{Broker, BrokerError, JobLedger};
use cf_core::{Clock, ErrorClass, Job, JobConfig, JobId, UuidIdGen};
use cf_pipeline::{PipelinePlan, StageBinding};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// How long a pool may sit worker-less before enqueues are refused.
pub const DEFAULT_STALE_POOL_THRESHOLD: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown stage: {0}")]
    StageUnknown(String),
    #[error("pool {pool} unavailable: {reason}")]
    PoolUnavailable { pool: String, reason: String },
    /// CPU work on a GPU pool or vice versa
    #[error("stage {stage} cannot run on pool {pool} (tier {tier})")]
    TierMismatch {
        stage: String,
        pool: String,
        tier: String,
    },
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

impl DispatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DispatchError::Broker(e) => e.class(),
            _ => ErrorClass::Resource,
        }
    }
}

pub struct DispatcherParams<C: Clock> {
    pub broker: Arc<dyn Broker>,
    pub ledger: Arc<JobLedger>,
    pub directory: Arc<WorkerDirectory>,
    pub plan: PipelinePlan,
    pub clock: C,
    pub stale_pool_threshold: Duration,
    pub max_worker_requeues: u32,
    /// Heartbeat TTL used for liveness checks (3× heartbeat interval)
    pub worker_ttl: Duration,
}

pub struct Dispatcher<C: Clock> {
    params: DispatcherParams<C>,
    id_gen: UuidIdGen,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(params: DispatcherParams<C>) -> Self {
        Self {
            params,
            id_gen: UuidIdGen,
        }
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.params.plan
    }

    /// Place a stage job on its pool with stage-appropriate priority.
    pub async fn enqueue_stage(
        &self,
        stage: &str,
        payload: serde_json::Value,
        correlation_id: Option<String>,
    ) -> Result<Job, DispatchError> {
        let binding = self
            .params
            .plan
            .binding(stage)
            .ok_or_else(|| DispatchError::StageUnknown(stage.to_string()))?
            .clone();
        self.admit(&binding)?;

        let mut config = JobConfig::new(
            JobId::generate(&self.id_gen),
            binding.pool.clone(),
            payload,
        )
        .priority(binding.priority)
        .max_worker_requeues(self.params.max_worker_requeues);
        if let Some(correlation) = correlation_id {
            config = config.correlation_id(correlation);
        }

        let job = self.params.broker.enqueue(config).await?;
        let _ = self.params.ledger.record(&job);
        debug!(stage, pool = %binding.pool, job = %job.id, "stage job enqueued");
        Ok(job)
    }

    /// Enqueue to an arbitrary declared pool (extension surface).
    pub async fn enqueue_pool(
        &self,
        pool: &str,
        payload: serde_json::Value,
        priority: i32,
        correlation_id: Option<String>,
    ) -> Result<Job, DispatchError> {
        let pool_def = self.params.directory.pool(pool).ok_or_else(|| {
            DispatchError::PoolUnavailable {
                pool: pool.to_string(),
                reason: "pool not declared".into(),
            }
        })?;
        self.check_liveness(&pool_def.name)?;

        let mut config = JobConfig::new(JobId::generate(&self.id_gen), pool, payload)
            .priority(priority)
            .max_worker_requeues(self.params.max_worker_requeues);
        if let Some(correlation) = correlation_id {
            config = config.correlation_id(correlation);
        }
        let job = self.params.broker.enqueue(config).await?;
        let _ = self.params.ledger.record(&job);
        Ok(job)
    }

    /// Admission rules: declared pool, matching tier, live (or recently
    /// live) workers.
    fn admit(&self, binding: &StageBinding) -> Result<(), DispatchError> {
        let pool = self.params.directory.pool(&binding.pool).ok_or_else(|| {
            DispatchError::PoolUnavailable {
                pool: binding.pool.clone(),
                reason: "pool not declared".into(),
            }
        })?;

        if pool.resource_tier.is_gpu() != binding.gpu {
            return Err(DispatchError::TierMismatch {
                stage: binding.stage.clone(),
                pool: pool.name.clone(),
                tier: pool.resource_tier.to_string(),
            });
        }

        self.check_liveness(&pool.name)
    }

    fn check_liveness(&self, pool: &str) -> Result<(), DispatchError> {
        let p = &self.params;
        let now_ms = p.clock.epoch_ms();
        let ttl_ms = p.worker_ttl.as_millis() as u64;

        if p.directory.live_workers(pool, now_ms, ttl_ms) > 0 {
            return Ok(());
        }

        let stale_ms = p.stale_pool_threshold.as_millis() as u64;
        match p.directory.last_liveness(pool) {
            Some(last) if now_ms.saturating_sub(last) <= stale_ms => Ok(()),
            Some(_) => Err(DispatchError::PoolUnavailable {
                pool: pool.to_string(),
                reason: "no live workers past stale threshold".into(),
            }),
            None => Err(DispatchError::PoolUnavailable {
                pool: pool.to_string(),
                reason: "no workers ever registered".into(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
