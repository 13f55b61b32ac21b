//! Clock loop and per-job bookkeeping

use crate::error::{Result, SchedulerError};
use crate::job::{Job, JobResult};
use crate::types::{JobState, JobStatus, SchedulerConfig};
use catalog_clock::{Clock, SystemClock};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

struct JobSlot {
    time_of_day: NaiveTime,
    job: Arc<dyn Job>,
    state: JobState,
    last_fired_date: Option<NaiveDate>,
    last_failed_date: Option<NaiveDate>,
    last_error: Option<String>,
    /// Day for which retries were given up, so the deferral is logged once
    deferred_date: Option<NaiveDate>,
}

impl JobSlot {
    /// The occurrence date this job should fire for at `now`, if it is due
    ///
    /// A failed occurrence is retried within `window` of its slot, even once
    /// the local date has rolled over.
    fn due_date(
        &mut self,
        name: &str,
        now: DateTime<FixedOffset>,
        window: chrono::Duration,
    ) -> Option<NaiveDate> {
        if self.state != JobState::Idle {
            return None;
        }
        let today = now.date_naive();

        if let Some(yesterday) = today.pred_opt() {
            if self.last_failed_date == Some(yesterday) && self.last_fired_date != Some(yesterday) {
                if self.within_window(yesterday, now, window) {
                    return Some(yesterday);
                }
                self.defer(name, yesterday);
            }
        }

        if self.last_fired_date == Some(today) || now.time() < self.time_of_day {
            return None;
        }

        if self.last_failed_date == Some(today) && !self.within_window(today, now, window) {
            self.defer(name, today);
            return None;
        }

        Some(today)
    }

    fn within_window(
        &self,
        date: NaiveDate,
        now: DateTime<FixedOffset>,
        window: chrono::Duration,
    ) -> bool {
        now.naive_local() - date.and_time(self.time_of_day) <= window
    }

    fn defer(&mut self, name: &str, date: NaiveDate) {
        if self.deferred_date != Some(date) {
            self.deferred_date = Some(date);
            warn!(job = %name, date = %date, "Retry window passed, deferring to next day");
        }
    }
}

struct Inner {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    jobs: Mutex<BTreeMap<String, JobSlot>>,
    /// Last fired dates restored from disk for jobs not registered yet
    restored: Mutex<HashMap<String, NaiveDate>>,
    /// Serializes state file rewrites
    persist_lock: tokio::sync::Mutex<()>,
}

/// Fires registered jobs at their time of day, at most once per day
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler, restoring last fired dates from `config.state_path`
    ///
    /// An unreadable state file is logged and ignored.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let restored = match &config.state_path {
            Some(path) => load_state(path)?,
            None => HashMap::new(),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                clock,
                jobs: Mutex::new(BTreeMap::new()),
                restored: Mutex::new(restored),
                persist_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Register a job to fire daily at `time_of_day` (local to the configured offset)
    pub fn register(
        &self,
        name: impl Into<String>,
        time_of_day: NaiveTime,
        job: Arc<dyn Job>,
    ) -> Result<()> {
        let name = name.into();
        let mut jobs = self.inner.lock_jobs();
        if jobs.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob(name));
        }

        let last_fired_date = self
            .inner
            .restored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name);

        info!(job = %name, time_of_day = %time_of_day, last_fired = ?last_fired_date, "Registered job");
        jobs.insert(
            name,
            JobSlot {
                time_of_day,
                job,
                state: JobState::Idle,
                last_fired_date,
                last_failed_date: None,
                last_error: None,
                deferred_date: None,
            },
        );
        Ok(())
    }

    /// Evaluate every job once and dispatch the due ones
    ///
    /// Returns the handles of the dispatched job tasks; the tick itself never
    /// waits for a job to finish.
    pub fn tick(&self) -> Vec<JoinHandle<()>> {
        let now = self
            .inner
            .clock
            .now()
            .with_timezone(&self.inner.config.utc_offset);
        let window = self.inner.config.retry_window;

        let due: Vec<(String, NaiveDate)> = {
            let mut jobs = self.inner.lock_jobs();
            jobs.iter_mut()
                .filter_map(|(name, slot)| {
                    let date = slot.due_date(name, now, window)?;
                    slot.state = JobState::Due;
                    Some((name.clone(), date))
                })
                .collect()
        };

        due.into_iter()
            .filter_map(|(name, date)| self.dispatch(name, date))
            .collect()
    }

    /// Move a `Due` job to `Firing` and run its body on its own task
    fn dispatch(&self, name: String, date: NaiveDate) -> Option<JoinHandle<()>> {
        let job = {
            let mut jobs = self.inner.lock_jobs();
            let slot = jobs.get_mut(&name)?;
            if slot.state != JobState::Due {
                return None;
            }
            slot.state = JobState::Firing;
            slot.job.clone()
        };

        info!(job = %name, date = %date, "Firing job");
        let inner = self.inner.clone();
        Some(tokio::spawn(async move {
            // Run on a nested task so a panicking job is reported like a failure
            let outcome = match tokio::spawn(async move { job.run().await }).await {
                Ok(result) => result,
                Err(e) => Err(format!("job task aborted: {}", e).into()),
            };
            inner.finish(&name, date, outcome).await;
        }))
    }

    /// Tick on the configured interval until `shutdown` is notified
    pub async fn run(&self, shutdown: Arc<Notify>) {
        let mut ticker = interval(self.inner.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick = ?self.inner.config.tick, "Scheduler started");

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("Scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let fired = self.tick();
                    if !fired.is_empty() {
                        debug!(count = fired.len(), "Dispatched jobs");
                    }
                }
            }
        }
    }

    pub fn snapshot(&self) -> Vec<JobStatus> {
        self.inner
            .lock_jobs()
            .iter()
            .map(|(name, slot)| JobStatus {
                name: name.clone(),
                time_of_day: slot.time_of_day,
                state: slot.state,
                last_fired_date: slot.last_fired_date,
                last_failed_date: slot.last_failed_date,
                last_error: slot.last_error.clone(),
            })
            .collect()
    }
}

impl Inner {
    fn lock_jobs(&self) -> MutexGuard<'_, BTreeMap<String, JobSlot>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a job's outcome and return it to `Idle`
    async fn finish(&self, name: &str, date: NaiveDate, outcome: JobResult) {
        let succeeded = {
            let mut jobs = self.lock_jobs();
            let Some(slot) = jobs.get_mut(name) else {
                return;
            };
            slot.state = JobState::Idle;
            match outcome {
                Ok(()) => {
                    slot.last_fired_date = Some(date);
                    slot.last_error = None;
                    info!(job = %name, date = %date, "Job completed");
                    true
                }
                Err(e) => {
                    slot.last_failed_date = Some(date);
                    slot.last_error = Some(e.to_string());
                    error!(job = %name, date = %date, error = %e, "Job failed");
                    false
                }
            }
        };

        if succeeded {
            if let Err(e) = self.persist().await {
                warn!(job = %name, error = %e, "Failed to persist scheduler state");
            }
        }
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.config.state_path else {
            return Ok(());
        };

        let _guard = self.persist_lock.lock().await;
        let fired: BTreeMap<String, NaiveDate> = {
            let mut fired: BTreeMap<String, NaiveDate> = self
                .restored
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(name, date)| (name.clone(), *date))
                .collect();
            fired.extend(
                self.lock_jobs()
                    .iter()
                    .filter_map(|(name, slot)| slot.last_fired_date.map(|d| (name.clone(), d))),
            );
            fired
        };

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&fired)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = ?path, jobs = fired.len(), "Persisted scheduler state");
        Ok(())
    }
}

fn load_state(path: &Path) -> Result<HashMap<String, NaiveDate>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = ?path, error = %e, "Scheduler state unreadable, starting fresh");
            HashMap::new()
        })),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}
