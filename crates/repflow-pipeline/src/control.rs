//! Job control plane.
//!
//! Admits ingestion requests, bounds pipeline parallelism with a semaphore,
//! and tracks cancellation tokens per job. Pipelines run concurrently up to
//! `MAX_CONCURRENT_REQUESTS`; within one pipeline everything is sequential.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use repflow_core::models::JobResult;
use repflow_core::AppError;

use crate::cancel::CancelToken;
use crate::orchestrator::{Orchestrator, PipelineContext};

pub struct JobControl {
    ctx: Arc<PipelineContext>,
    semaphore: Arc<Semaphore>,
    active: Arc<Mutex<HashMap<String, CancelToken>>>,
}

impl JobControl {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        let permits = ctx.config.max_concurrent_requests;
        Self {
            ctx,
            semaphore: Arc::new(Semaphore::new(permits)),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Admit a URL for background ingestion. Creates the pending job record
    /// immediately and returns the job id; the pipeline itself runs on a
    /// spawned task once a permit is available.
    #[tracing::instrument(skip(self))]
    pub async fn submit(&self, url: String) -> Result<String, AppError> {
        let job_id = Uuid::new_v4().to_string();
        self.ctx.jobs.create(&job_id).await?;

        let cancel = CancelToken::new();
        self.active
            .lock()
            .await
            .insert(job_id.clone(), cancel.clone());

        let ctx = self.ctx.clone();
        let semaphore = self.semaphore.clone();
        let active = self.active.clone();
        let spawned_job_id = job_id.clone();
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return, // semaphore closed during shutdown
            };
            let orchestrator = Orchestrator::new(ctx);
            orchestrator.run(&url, &spawned_job_id, &cancel).await;
            active.lock().await.remove(&spawned_job_id);
        });

        Ok(job_id)
    }

    /// Run one ingestion inline, returning its terminal result. Used by the
    /// CLI where there is nothing else to do while the pipeline runs.
    pub async fn run_blocking(&self, url: &str) -> Result<(String, JobResult), AppError> {
        let job_id = Uuid::new_v4().to_string();
        self.ctx.jobs.create(&job_id).await?;
        let cancel = CancelToken::new();
        self.active
            .lock()
            .await
            .insert(job_id.clone(), cancel.clone());

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| AppError::Internal("job control shut down".into()))?;
        let orchestrator = Orchestrator::new(self.ctx.clone());
        let result = orchestrator.run(url, &job_id, &cancel).await;
        self.active.lock().await.remove(&job_id);
        Ok((job_id, result))
    }

    /// Request cancellation of a running job. Returns false when the job is
    /// not currently active (unknown, or already terminal).
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.active.lock().await.get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }
}
