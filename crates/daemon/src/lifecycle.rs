// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup wiring and shutdown.
//!
//! Startup order: lock file, broker + ledger recovery, content store
//! migrations, session log truncation, engines, extension host, pool
//! workers, supervisor, coordinator. Shutdown cancels the root token and
//! quiesces extensions before releasing the lock.

use crate::config::{ConfigError, DaemonConfig};
use crate::env::{DaemonEnv, EnvError};
use crate::protocol::{PoolStatus, Request, Response};
use crate::routes;
use crate::wire::PROTOCOL_VERSION;
use cf_broker::{Broker, BrokerError, DurableBroker, JobLedger};
use cf_bus::EventBus;
use cf_core::{Clock, ErrorClass, IdGen, JobId, SystemClock, UuidIdGen, WorkerId};
use cf_engines::{
    EmbeddingEncoder, HashEncoder, HttpEmbeddingEncoder, HttpOcrEngine, LazyEngine, OcrEngine,
};
use cf_host::{ApiRequest, ExtensionHost, HostError, HostParams};
use cf_pipeline::{
    ChunkStage, EmbedStage, ExtractStage, NerStage, NormalizeStage, OcrConfig, OcrStage,
    PipelinePlan, StageContext,
};
use cf_runtime::{
    ActivityLogger, Coordinator, CoordinatorParams, Dispatcher, DispatcherParams, HandlerRegistry,
    Supervisor, SupervisorParams, Worker, WorkerDirectory, WorkerParams,
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_STALE_POOL_THRESHOLD,
};
use cf_store::{ContentStore, CoreSchema, StoreError, VectorStore};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("environment error: {0}")]
    Env(#[from] EnvError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("host error: {0}")]
    Host(#[from] HostError),
    #[error("ledger error: {0}")]
    Ledger(#[from] cf_broker::LedgerError),
    #[error("session log error: {0}")]
    SessionLog(#[from] cf_bus::SessionLogError),
    #[error("another daemon holds the lock at {0}")]
    Locked(String),
    #[error("unknown pool: {0}")]
    UnknownPool(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Daemon {
    pub env: DaemonEnv,
    pub broker: Arc<dyn Broker>,
    durable: Arc<DurableBroker>,
    pub ledger: Arc<JobLedger>,
    pub bus: EventBus,
    pub core: CoreSchema,
    pub vectors: VectorStore,
    pub directory: Arc<WorkerDirectory>,
    pub registry: Arc<HandlerRegistry>,
    pub dispatcher: Arc<Dispatcher<SystemClock>>,
    pub coordinator: Arc<Coordinator<SystemClock>>,
    pub host: Arc<ExtensionHost>,
    cancel: CancellationToken,
    stage_ctx: StageContext,
    worker_handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    _lock: File,
}

impl Daemon {
    /// Build and start everything. Extensions initialize in registration
    /// order.
    pub async fn start(
        env: DaemonEnv,
        config: DaemonConfig,
        extensions: Vec<Arc<dyn cf_host::Extension>>,
    ) -> Result<Arc<Self>, DaemonError> {
        std::fs::create_dir_all(&env.data_root)?;
        let lock = File::create(env.lock_path())?;
        lock.try_lock_exclusive()
            .map_err(|_| DaemonError::Locked(env.lock_path().display().to_string()))?;

        let clock = SystemClock;
        let config = config.with_default_pools();

        // Durable state first: broker journal replay, ledger, store
        let durable = Arc::new(DurableBroker::open(&env.broker_path)?);
        let broker: Arc<dyn Broker> = Arc::clone(&durable) as Arc<dyn Broker>;
        let ledger = Arc::new(JobLedger::open(&env.ledger_path())?);
        ledger.purge_expired(clock.epoch_ms())?;

        let store = ContentStore::open(&env.store_path)?;
        let core = CoreSchema::open(store.schema_versioned(
            "core",
            routes::CORE_SCHEMA_VERSION,
            &routes::core_migrations(),
        )?)?;
        let vectors = VectorStore::open(store.schema("vectors")?)?;

        // Session-scoped event trail, truncated on startup by design
        let bus = EventBus::with_session_log(&env.session_log_path())?;

        let directory = Arc::new(WorkerDirectory::new());
        let registry = Arc::new(HandlerRegistry::new());

        let pool_defs = config.pool_defs()?;
        for (pool, _) in &pool_defs {
            directory.register_pool(pool.clone());
        }

        let dispatcher = Arc::new(Dispatcher::new(DispatcherParams {
            broker: Arc::clone(&broker),
            ledger: Arc::clone(&ledger),
            directory: Arc::clone(&directory),
            plan: PipelinePlan::standard(),
            clock,
            stale_pool_threshold: DEFAULT_STALE_POOL_THRESHOLD,
            max_worker_requeues: env.max_worker_requeues,
            worker_ttl: DEFAULT_HEARTBEAT_INTERVAL * 3,
        }));

        let stage_ctx = StageContext {
            core: core.clone(),
            vectors: vectors.clone(),
            bus: bus.clone(),
            data_root: env.data_root.clone(),
        };

        Self::register_stage_handlers(&registry, &config);

        let coordinator = Arc::new(Coordinator::new(CoordinatorParams {
            core: core.clone(),
            broker: Arc::clone(&broker),
            ledger: Arc::clone(&ledger),
            dispatcher: Arc::clone(&dispatcher),
            bus: bus.clone(),
            clock,
            data_root: env.data_root.clone(),
            chunking: config.chunking.clone(),
            logger: Arc::new(ActivityLogger::new(env.log_dir())),
        }));

        let host = Arc::new(ExtensionHost::new(HostParams {
            store: store.clone(),
            bus: bus.clone(),
            submitter: Arc::clone(&dispatcher) as Arc<dyn cf_host::JobSubmitter>,
            directory: Arc::clone(&directory),
            registry: Arc::clone(&registry),
        }));
        for extension in extensions {
            host.register(extension)?;
        }
        host.initialize_all().await?;

        let cancel = CancellationToken::new();
        let daemon = Arc::new(Self {
            env,
            broker,
            durable,
            ledger,
            bus,
            core,
            vectors,
            directory,
            registry,
            dispatcher,
            coordinator,
            host,
            cancel,
            stage_ctx,
            worker_handles: Mutex::new(Vec::new()),
            _lock: lock,
        });

        daemon.host.mount_core_routes("/api/core", routes::core_routes(&daemon));
        daemon
            .host
            .mount_core_routes("/api", routes::job_routes(&daemon));

        // Supervisor recovers jobs from dead workers
        {
            let supervisor = Supervisor::new(SupervisorParams {
                broker: Arc::clone(&daemon.broker),
                ledger: Arc::clone(&daemon.ledger),
                directory: Arc::clone(&daemon.directory),
                bus: daemon.bus.clone(),
                clock,
                heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            });
            let token = daemon.cancel.clone();
            daemon
                .worker_handles
                .lock()
                .push(tokio::spawn(supervisor.run(token)));
        }

        // Coordinator drives document state machines off the bus
        {
            let coordinator = Arc::clone(&daemon.coordinator);
            let token = daemon.cancel.clone();
            daemon
                .worker_handles
                .lock()
                .push(tokio::spawn(coordinator.run(token)));
        }

        // In-process workers per pool
        for (pool, workers) in pool_defs {
            for _ in 0..workers {
                daemon.spawn_worker_for(&pool.name)?;
            }
        }

        info!(data_root = %daemon.env.data_root.display(), "casefiled started");
        Ok(daemon)
    }

    fn register_stage_handlers(registry: &HandlerRegistry, config: &DaemonConfig) {
        registry.register("extract", Arc::new(ExtractStage));
        registry.register("normalize", Arc::new(NormalizeStage));
        registry.register("chunk", Arc::new(ChunkStage));
        registry.register(
            "ner",
            Arc::new(NerStage::new(Arc::new(cf_engines::HeuristicNer::new()))),
        );

        // Lazy engines: nothing initializes until the first job
        let embed_config = config.embed.clone();
        let encoder: LazyEngine<dyn EmbeddingEncoder> = match embed_config.endpoint.clone() {
            Some(endpoint) => LazyEngine::new(move || {
                Ok(Arc::new(HttpEmbeddingEncoder::new(
                    embed_config.model.clone(),
                    embed_config.dimensions,
                    endpoint.clone(),
                    Duration::from_secs(60),
                )?) as Arc<dyn EmbeddingEncoder>)
            }),
            None => LazyEngine::ready(
                Arc::new(HashEncoder::new(config.embed.dimensions)) as Arc<dyn EmbeddingEncoder>
            ),
        };
        registry.register(
            "embed",
            Arc::new(EmbedStage::new(encoder, config.embed.collection.clone())),
        );

        let fast = config.ocr.fast_endpoint.clone().map(|endpoint| {
            LazyEngine::new(move || {
                Ok(Arc::new(HttpOcrEngine::new(
                    "fast",
                    endpoint.clone(),
                    Duration::from_secs(120),
                )?) as Arc<dyn OcrEngine>)
            })
        });
        let heavy = config.ocr.heavy_endpoint.clone().map(|endpoint| {
            LazyEngine::new(move || {
                Ok(Arc::new(HttpOcrEngine::new(
                    "heavy",
                    endpoint.clone(),
                    Duration::from_secs(300),
                )?) as Arc<dyn OcrEngine>)
            })
        });
        registry.register(
            "ocr",
            Arc::new(OcrStage::new(
                fast,
                heavy,
                OcrConfig {
                    confidence_threshold: config.ocr.confidence_threshold,
                    ..OcrConfig::default()
                },
            )),
        );
    }

    /// Start one in-process worker draining the given pool.
    pub fn spawn_worker_for(self: &Arc<Self>, pool: &str) -> Result<WorkerId, DaemonError> {
        let pool_def = self
            .directory
            .pool(pool)
            .ok_or_else(|| DaemonError::UnknownPool(pool.to_string()))?;

        let worker_id = WorkerId::new(format!("{}-{}", pool, UuidIdGen.next()));
        // Register eagerly so admission checks pass before the worker
        // task gets its first tick; the worker re-registers on start
        self.directory.register_worker(cf_core::WorkerRecord::new(
            worker_id.clone(),
            pool_def.name.clone(),
            hostname(),
            SystemClock.epoch_ms(),
        ));
        let params = WorkerParams {
            id: worker_id.clone(),
            pool: pool_def,
            host: hostname(),
            broker: Arc::clone(&self.broker),
            ledger: Arc::clone(&self.ledger),
            registry: Arc::clone(&self.registry),
            directory: Arc::clone(&self.directory),
            bus: self.bus.clone(),
            ctx: self.stage_ctx.clone(),
            clock: SystemClock,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            logger: Arc::new(ActivityLogger::new(self.env.log_dir())),
        };
        let token = self.cancel.clone();
        self.worker_handles
            .lock()
            .push(tokio::spawn(Worker::run_supervised(params, token)));
        Ok(worker_id)
    }

    /// Handle one protocol request.
    pub async fn handle_request(self: &Arc<Self>, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong {
                version: PROTOCOL_VERSION.to_string(),
            },

            Request::Enqueue {
                pool,
                payload,
                priority,
            } => match self
                .dispatcher
                .enqueue_pool(&pool, payload, priority, None)
                .await
            {
                Ok(job) => Response::Job { job: Box::new(job) },
                Err(e) => Response::error(e.class(), e.to_string()),
            },

            Request::JobStatus { id } => {
                let job_id = JobId::new(id.clone());
                match self.broker.job(&job_id).await {
                    Ok(Some(job)) => Response::Job { job: Box::new(job) },
                    Ok(None) => match self.ledger.get(&job_id) {
                        Some(job) => Response::Job { job: Box::new(job) },
                        None => Response::JobNotFound { id },
                    },
                    Err(e) => Response::error(e.class(), e.to_string()),
                }
            }

            Request::Pools => {
                let now_ms = SystemClock.epoch_ms();
                let ttl_ms = (DEFAULT_HEARTBEAT_INTERVAL * 3).as_millis() as u64;
                let mut pools = Vec::new();
                for pool in self.directory.pools() {
                    let pending = self.broker.pool_depth(&pool.name).await.unwrap_or(0);
                    pools.push(PoolStatus {
                        live_workers: self.directory.live_workers(&pool.name, now_ms, ttl_ms),
                        name: pool.name,
                        resource_tier: pool.resource_tier.to_string(),
                        max_concurrency: pool.max_concurrency,
                        pending,
                    });
                }
                pools.sort_by(|a, b| a.name.cmp(&b.name));
                Response::Pools { pools }
            }

            Request::Ingest { path } => match self.coordinator.ingest(&path).await {
                Ok(outcome) => {
                    let existing =
                        matches!(outcome, cf_runtime::IngestOutcome::Existing { .. });
                    let job_id = match &outcome {
                        cf_runtime::IngestOutcome::Created { job, .. } => {
                            Some(job.id.to_string())
                        }
                        cf_runtime::IngestOutcome::Existing { .. } => None,
                    };
                    Response::Ingested {
                        document_id: outcome.document_id().to_string(),
                        job_id,
                        existing,
                    }
                }
                Err(e) => Response::error(ErrorClass::Payload, e.to_string()),
            },

            Request::Requeue { id } => {
                match self.coordinator.requeue(&JobId::new(id)).await {
                    Ok(job) => Response::Job { job: Box::new(job) },
                    Err(e) => Response::error(ErrorClass::Payload, e.to_string()),
                }
            }

            Request::Events { limit } => Response::Events {
                events: self.bus.recent_events(limit),
            },

            Request::WorkerStart { pool } => match self.spawn_worker_for(&pool) {
                Ok(worker_id) => Response::WorkerStarted {
                    worker_id: worker_id.to_string(),
                    pool,
                },
                Err(e) => Response::error(ErrorClass::Resource, e.to_string()),
            },

            Request::Api { method, path, body } => {
                let response = self.host.dispatch(ApiRequest::new(method, path, body)).await;
                Response::Api {
                    status: response.status,
                    body: response.body,
                }
            }

            Request::Shutdown => {
                self.cancel.cancel();
                Response::ShuttingDown
            }
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel workers, quiesce extensions, flush durable state.
    pub async fn shutdown(self: &Arc<Self>) {
        self.cancel.cancel();
        let handles: Vec<_> = self.worker_handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "task join failed at shutdown");
            }
        }
        self.host.shutdown_all().await;
        if let Err(e) = self.durable.flush() {
            warn!(error = %e, "broker flush failed at shutdown");
        }
        if let Err(e) = self.ledger.flush() {
            warn!(error = %e, "ledger flush failed at shutdown");
        }
        info!("casefiled stopped");
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
