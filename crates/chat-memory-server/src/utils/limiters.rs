use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::services::BackendError;

#[derive(Clone)]
pub struct Limiters {
    pub llm_generate: Arc<Semaphore>,
    pub acquire_timeout: Duration,
}

impl Limiters {
    /// A backend that cannot infer concurrently gets a single permit.
    pub fn new(cfg: &crate::config::LimitsConfig, concurrent_inference: bool) -> Self {
        let permits = if concurrent_inference {
            cfg.llm_concurrency.max(1)
        } else {
            1
        };

        Self {
            llm_generate: Arc::new(Semaphore::new(permits)),
            acquire_timeout: Duration::from_millis(cfg.acquire_timeout_ms.max(1)),
        }
    }

    pub async fn acquire_timed(
        sem: Arc<Semaphore>,
        acquire_timeout: Duration,
        op: &'static str,
    ) -> Result<(OwnedSemaphorePermit, Duration), BackendError> {
        let start = Instant::now();

        let permit = tokio::time::timeout(acquire_timeout, sem.acquire_owned())
            .await
            .map_err(|_| BackendError::Busy(format!("Limiter acquire timeout for op={}", op)))?
            .map_err(|_| BackendError::Busy(format!("Limiter closed for op={}", op)))?;

        let waited = start.elapsed();
        debug!("Acquired {} permit after {:?}", op, waited);
        Ok((permit, waited))
    }

    /// Permit for one backend call, held until dropped.
    pub async fn acquire_llm(&self) -> Result<OwnedSemaphorePermit, BackendError> {
        let (permit, _) =
            Self::acquire_timed(self.llm_generate.clone(), self.acquire_timeout, "llm_generate").await?;
        Ok(permit)
    }
}
