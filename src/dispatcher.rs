//! Resync loop over all declared sources.
//!
//! Every tick the dispatcher lists the declarations and starts a
//! reconciliation for each source that is due. A source is due when its
//! requeue time has passed or its generation changed since the last run.
//! Failed runs are requeued with exponential backoff. Concurrency is bounded
//! by a semaphore and a source never has two reconciliations in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hsc_core::{HttpSource, ObjectKey, Resource};
use hsc_reconciler::{HttpSourceReconciler, ReconcileOutcome};
use hsc_store::ObjectStore;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shortest tick the loop runs with.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Requeue delays after failed reconciliations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    #[serde(with = "duration_secs")]
    pub initial_delay: Duration,
    /// Cap on the delay.
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Set the first delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay after `failures` consecutive failures.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Settings of the resync loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How often declarations are listed.
    #[serde(with = "duration_secs")]
    pub tick: Duration,
    /// Reconciliations running at the same time.
    pub max_concurrent_reconciles: usize,
    /// Consecutive listing failures before the loop gives up.
    pub max_errors: usize,
    /// Requeue delays after failures.
    pub backoff: BackoffConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            max_concurrent_reconciles: 4,
            max_errors: 10,
            backoff: BackoffConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// Check the settings the loop cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the offending field and why it was rejected.
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        if self.tick.is_zero() {
            return Err(("dispatch.tick", "must be greater than zero".to_string()));
        }
        if self.max_concurrent_reconciles == 0 {
            return Err((
                "dispatch.max_concurrent_reconciles",
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    next_due: Instant,
    failures: u32,
    generation: Option<i64>,
    in_flight: bool,
}

/// When each source is next due.
#[derive(Debug)]
pub struct Schedule {
    entries: HashMap<ObjectKey, Entry>,
    backoff: BackoffConfig,
    resync_interval: Duration,
}

impl Schedule {
    /// Create an empty schedule.
    pub fn new(backoff: BackoffConfig, resync_interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            backoff,
            resync_interval,
        }
    }

    /// Mark every due source as in flight and return their keys.
    ///
    /// Sources missing from `sources` are forgotten, unless a run is still
    /// in flight.
    pub fn claim_due(&mut self, sources: &[HttpSource], now: Instant) -> Vec<ObjectKey> {
        self.entries.retain(|key, entry| {
            entry.in_flight || sources.iter().any(|source| source.key() == *key)
        });

        sources
            .iter()
            .filter_map(|source| {
                let key = source.key();
                let generation = source.metadata.generation;
                let entry = self.entries.entry(key.clone()).or_insert(Entry {
                    next_due: now,
                    failures: 0,
                    generation: None,
                    in_flight: false,
                });

                let changed = entry.generation != Some(generation);
                if entry.in_flight || (!changed && now < entry.next_due) {
                    return None;
                }
                entry.in_flight = true;
                entry.generation = Some(generation);
                Some(key)
            })
            .collect()
    }

    /// Record the result of a run and return the delay until the next one.
    pub fn finish(
        &mut self,
        key: &ObjectKey,
        now: Instant,
        result: &hsc_reconciler::Result<ReconcileOutcome>,
    ) -> Duration {
        let delay = match result {
            Ok(outcome) => outcome.requeue_after.unwrap_or(self.resync_interval),
            Err(e) if e.is_retryable() => {
                let failures = self.entries.get(key).map_or(1, |entry| entry.failures + 1);
                self.backoff.delay(failures)
            }
            Err(_) => self.resync_interval,
        };

        if let Some(entry) = self.entries.get_mut(key) {
            entry.in_flight = false;
            entry.next_due = now + delay;
            entry.failures = match result {
                Ok(_) => 0,
                Err(_) => entry.failures.saturating_add(1),
            };
        }
        delay
    }

    /// Consecutive failures recorded for `key`.
    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.entries.get(key).map_or(0, |entry| entry.failures)
    }
}

struct Shared {
    reconciler: Arc<HttpSourceReconciler>,
    schedule: Mutex<Schedule>,
    permits: Semaphore,
}

/// Runs reconciliations of all declared sources until cancelled.
pub struct Dispatcher {
    sources: Arc<dyn ObjectStore<HttpSource>>,
    shared: Arc<Shared>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher over the given declarations.
    pub fn new(
        reconciler: Arc<HttpSourceReconciler>,
        sources: Arc<dyn ObjectStore<HttpSource>>,
        config: DispatchConfig,
    ) -> Self {
        let schedule = Schedule::new(
            config.backoff.clone(),
            reconciler.config().resync_interval,
        );
        Self {
            sources,
            shared: Arc::new(Shared {
                reconciler,
                schedule: Mutex::new(schedule),
                permits: Semaphore::new(config.max_concurrent_reconciles.max(1)),
            }),
            config,
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Cancellation also cancels in-flight fetches; the loop waits for the
    /// running reconciliations to record their status before returning.
    /// A tick below [`MIN_TICK`] runs at [`MIN_TICK`].
    ///
    /// # Errors
    ///
    /// Returns the listing error after `max_errors` consecutive failures.
    pub async fn run(&self, cancel: CancellationToken) -> hsc_store::Result<()> {
        let tick = self.config.tick.max(MIN_TICK);
        info!(
            tick_ms = tick.as_millis(),
            max_concurrent = self.config.max_concurrent_reconciles,
            "Starting dispatcher"
        );

        let mut tasks = JoinSet::new();
        let mut interval = tokio::time::interval(tick);
        let mut consecutive_errors = 0usize;

        let result = loop {
            tokio::select! {
                () = cancel.cancelled() => break Ok(()),
                _ = interval.tick() => {
                    match self.dispatch_due(&mut tasks, &cancel).await {
                        Ok(started) => {
                            consecutive_errors = 0;
                            if started > 0 {
                                debug!(started, "Dispatched reconciliations");
                            }
                        }
                        Err(e) => {
                            consecutive_errors += 1;
                            error!(
                                error = %e,
                                consecutive = consecutive_errors,
                                "Failed to list sources"
                            );
                            if consecutive_errors >= self.config.max_errors {
                                break Err(e);
                            }
                        }
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Reconciliation task failed");
                    }
                }
            }
        };

        cancel.cancel();
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Reconciliation task failed");
            }
        }
        info!("Dispatcher stopped");
        result
    }

    /// Start a reconciliation for every due source. Returns how many started.
    ///
    /// # Errors
    ///
    /// Returns the store error when the declarations cannot be listed.
    pub async fn dispatch_due(
        &self,
        tasks: &mut JoinSet<()>,
        cancel: &CancellationToken,
    ) -> hsc_store::Result<usize> {
        let sources = self.sources.list_all().await?;
        let due = self
            .shared
            .schedule
            .lock()
            .await
            .claim_due(&sources, Instant::now());

        let started = due.len();
        for key in due {
            let shared = Arc::clone(&self.shared);
            let cancel = cancel.child_token();
            tasks.spawn(async move { shared.reconcile_one(key, cancel).await });
        }
        Ok(started)
    }
}

impl Shared {
    async fn reconcile_one(&self, key: ObjectKey, cancel: CancellationToken) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };

        let result = self.reconciler.reconcile(&cancel, &key).await;
        let mut schedule = self.schedule.lock().await;
        let delay = schedule.finish(&key, Instant::now(), &result);

        match result {
            Ok(outcome) if outcome.is_skipped() => {
                debug!(source = %key, "Nothing to reconcile");
            }
            Ok(outcome) => {
                debug!(
                    source = %key,
                    revision = outcome.revision.as_deref().unwrap_or_default(),
                    requeue_secs = delay.as_secs(),
                    "Reconciled"
                );
            }
            Err(e) => {
                warn!(
                    source = %key,
                    error = %e,
                    failures = schedule.failures(&key),
                    retry_in_ms = delay.as_millis(),
                    "Reconciliation failed, requeued"
                );
            }
        }
    }
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
