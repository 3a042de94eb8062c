//! Run context: collaborators, settings and the shutdown signal.
//!
//! A `FleetContext` is built once at process start and handed to every
//! component. It owns the three waiting primitives the workspace uses:
//!
//! - `call()` runs a collaborator call, retrying transient failures with
//!   exponential backoff (initial → doubled per attempt → capped);
//! - `sleep()` sleeps unless the shutdown signal fires first;
//! - `poll_until()` sleeps then probes until the probe yields a value or
//!   the timeout elapses.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api::{ComputeApi, ContainerApi, ScalingApi};
use crate::config::{RetryPolicy, Settings};
use crate::error::{ApiResult, FleetError, FleetResult};

/// Retry policy plus shutdown receiver; the part of the context that waits.
#[derive(Debug, Clone)]
pub struct RunControl {
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl RunControl {
    pub fn new(retry: RetryPolicy, shutdown: watch::Receiver<bool>) -> Self {
        Self { retry, shutdown }
    }

    /// True once the shutdown signal has been sent.
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep for `duration`, returning `Cancelled` if shutdown fires first.
    pub async fn sleep(&self, duration: Duration, phase: &'static str) -> FleetResult<()> {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow_and_update() {
            return Err(FleetError::Cancelled { phase });
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(()),
                changed = shutdown.changed() => match changed {
                    Ok(()) if *shutdown.borrow_and_update() => {
                        return Err(FleetError::Cancelled { phase });
                    }
                    Ok(()) => continue,
                    // Sender gone: nobody can cancel us any more.
                    Err(_) => {
                        (&mut sleep).await;
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Run a collaborator call, retrying throttling and unavailability.
    pub async fn call<T, F, Fut>(&self, operation: &'static str, mut f: F) -> FleetResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt = 1;
        let mut backoff = self.retry.initial_backoff;

        loop {
            if self.is_cancelled() {
                return Err(FleetError::Cancelled { phase: operation });
            }

            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "transient API failure, retrying"
                    );
                    self.sleep(backoff, operation).await?;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                    attempt += 1;
                }
                Err(source) => return Err(FleetError::Api { operation, source }),
            }
        }
    }

    /// Sleep `interval`, run `probe`, repeat until it yields `Some`.
    ///
    /// Fails with `Timeout` once `timeout` has elapsed without a value.
    pub async fn poll_until<T, F, Fut>(
        &self,
        phase: &'static str,
        interval: Duration,
        timeout: Duration,
        mut probe: F,
    ) -> FleetResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FleetResult<Option<T>>>,
    {
        let started = Instant::now();

        loop {
            self.sleep(interval, phase).await?;

            if let Some(value) = probe().await? {
                return Ok(value);
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(FleetError::Timeout { phase, elapsed });
            }
            debug!(phase, elapsed_secs = elapsed.as_secs(), "still waiting");
        }
    }
}

/// Everything a component needs to talk to the fleet.
#[derive(Clone)]
pub struct FleetContext {
    container: Arc<dyn ContainerApi>,
    compute: Arc<dyn ComputeApi>,
    scaling: Arc<dyn ScalingApi>,
    settings: Arc<Settings>,
    control: RunControl,
}

impl FleetContext {
    pub fn new(
        container: Arc<dyn ContainerApi>,
        compute: Arc<dyn ComputeApi>,
        scaling: Arc<dyn ScalingApi>,
        settings: Settings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let control = RunControl::new(settings.retry, shutdown);
        Self {
            container,
            compute,
            scaling,
            settings: Arc::new(settings),
            control,
        }
    }

    /// Build a context from one backend that implements all three services.
    pub fn from_backend<B>(backend: Arc<B>, settings: Settings, shutdown: watch::Receiver<bool>) -> Self
    where
        B: ContainerApi + ComputeApi + ScalingApi + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend, settings, shutdown)
    }

    pub fn container(&self) -> &dyn ContainerApi {
        self.container.as_ref()
    }

    pub fn compute(&self) -> &dyn ComputeApi {
        self.compute.as_ref()
    }

    pub fn scaling(&self) -> &dyn ScalingApi {
        self.scaling.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    pub async fn call<T, F, Fut>(&self, operation: &'static str, f: F) -> FleetResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        self.control.call(operation, f).await
    }

    pub async fn sleep(&self, duration: Duration, phase: &'static str) -> FleetResult<()> {
        self.control.sleep(duration, phase).await
    }

    pub async fn poll_until<T, F, Fut>(
        &self,
        phase: &'static str,
        interval: Duration,
        timeout: Duration,
        probe: F,
    ) -> FleetResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FleetResult<Option<T>>>,
    {
        self.control.poll_until(phase, interval, timeout, probe).await
    }
}
