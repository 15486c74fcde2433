//! # Reminder Scheduler
//!
//! Polls the store on a fixed cadence, runs every active reminder through the
//! [`TriggerEngine`], delivers the ones that fire and persists their new state.
//!
//! A tick runs to completion before the next one can start, and reminders in a
//! tick are handled one at a time, so no reminder is delivered or written twice
//! per tick. Failures are contained to the reminder they belong to.
//!
//! - **Version**: 2.0.1
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 2.0.1: Start/stop change the running flag and loop handle under one lock
//! - 2.0.0: Replace per-reminder timers with store polling; add start/stop lifecycle and status
//! - 1.1.0: Delivery timeout, tick reports
//! - 1.0.0: Initial scheduler loop

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::engine::{Transition, TriggerEngine};
use super::model::Reminder;
use super::notifier::{MessageRenderer, Notifier};
use super::store::ReminderStore;
use crate::core::{Config, ReminderError};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between ticks
    pub check_interval: Duration,
    /// Upper bound on a single delivery
    pub delivery_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            delivery_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            check_interval: config.check_interval,
            delivery_timeout: config.delivery_timeout,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Active reminders looked at
    pub evaluated: usize,
    /// Reminders handed to the notifier (including failed deliveries)
    pub fired: usize,
    /// Due reminders skipped because today is filtered out
    pub skipped: usize,
    /// Reminders that became inactive this tick
    pub deactivated: usize,
    pub delivery_failures: usize,
    pub persistence_failures: usize,
    pub configuration_errors: usize,
    /// The store could not be read at all
    pub store_unavailable: bool,
}

impl TickReport {
    fn is_idle(&self) -> bool {
        self.fired == 0 && self.skipped == 0 && self.deactivated == 0
    }
}

/// Health snapshot for status reporting
#[derive(Debug, Clone, Default)]
pub struct SchedulerStatus {
    pub running: bool,
    pub ticks: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_report: Option<TickReport>,
    pub consecutive_store_failures: u32,
    pub last_store_error: Option<String>,
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn MessageRenderer>,
    engine: TriggerEngine,
    config: SchedulerConfig,
    running: AtomicBool,
    loop_handle: StdMutex<Option<LoopHandle>>,
    /// Held for the duration of a tick
    tick_lock: Mutex<()>,
    status: RwLock<SchedulerStatus>,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn MessageRenderer>,
        engine: TriggerEngine,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            renderer,
            engine,
            config,
            running: AtomicBool::new(false),
            loop_handle: StdMutex::new(None),
            tick_lock: Mutex::new(()),
            status: RwLock::new(SchedulerStatus::default()),
        }
    }

    /// Start the polling loop on the current tokio runtime
    ///
    /// Calling this while the loop is already running does nothing.
    pub fn start(self: &Arc<Self>) {
        // Held until the handle is stored so a concurrent stop() always finds it
        let mut handle = match self.loop_handle.lock() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Reminder scheduler state poisoned: {e}");
                return;
            }
        };

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Reminder scheduler already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let task = tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        });

        *handle = Some(LoopHandle {
            shutdown: shutdown_tx,
            task,
        });
        drop(handle);

        info!(
            "⏰ Reminder scheduler started (interval: {}s)",
            self.config.check_interval.as_secs_f64()
        );
    }

    /// Cancel the cadence; a tick already in progress is allowed to finish
    ///
    /// Safe to call repeatedly.
    pub fn stop(&self) {
        self.take_loop();
    }

    /// Stop the loop and wait for an in-flight tick to complete
    pub async fn shutdown(&self) {
        if let Some(handle) = self.take_loop() {
            if let Err(e) = handle.task.await {
                warn!("Reminder scheduler task ended abnormally: {e}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SchedulerStatus {
        let mut status = self
            .status
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();
        status.running = self.is_running();
        status
    }

    fn take_loop(&self) -> Option<LoopHandle> {
        // Flag and handle change together under the lock, as in start()
        let mut guard = match self.loop_handle.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Reminder scheduler state poisoned: {e}");
                return None;
            }
        };
        if !self.running.swap(false, Ordering::SeqCst) {
            return None;
        }
        let handle = guard.take();
        drop(guard);
        if let Some(handle) = &handle {
            let _ = handle.shutdown.send(true);
        }
        info!("Reminder scheduler stopped");
        handle
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_tick_at(Utc::now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Reminder scheduler loop exited");
    }

    /// Run one tick as of `now`
    ///
    /// Waits for any tick already in progress, so ticks never overlap.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let _tick = self.tick_lock.lock().await;
        let mut report = TickReport::default();

        let reminders = match self.store.get_active().await {
            Ok(reminders) => {
                self.record_store_success();
                reminders
            }
            Err(e) => {
                error!("Failed to load active reminders: {e}");
                report.store_unavailable = true;
                self.record_store_failure(&e);
                self.record_tick(now, &report);
                return report;
            }
        };

        for reminder in &reminders {
            report.evaluated += 1;
            self.process_reminder(reminder, now, &mut report).await;
        }

        if report.is_idle() {
            debug!("Reminder tick: {} active, nothing due", report.evaluated);
        } else {
            info!(
                "Reminder tick: {} fired, {} skipped, {} deactivated ({} delivery failures, {} persistence failures)",
                report.fired,
                report.skipped,
                report.deactivated,
                report.delivery_failures,
                report.persistence_failures
            );
        }

        self.record_tick(now, &report);
        report
    }

    async fn process_reminder(&self, reminder: &Reminder, now: DateTime<Utc>, report: &mut TickReport) {
        let transition = match self.engine.evaluate(reminder, now) {
            Ok(Some(transition)) => transition,
            Ok(None) => return,
            Err(e) => {
                // Leave the stored state alone; it is re-evaluated next tick
                if e.is_configuration() {
                    report.configuration_errors += 1;
                }
                error!("Cannot schedule reminder {}: {e}", reminder.id);
                return;
            }
        };

        match &transition {
            Transition::Fire { .. } => {
                report.fired += 1;
                if let Err(e) = self.deliver(reminder).await {
                    // Still advance so an unreachable channel is not retried every tick
                    report.delivery_failures += 1;
                    warn!("Failed to deliver reminder {}: {e}", reminder.id);
                } else {
                    info!(
                        "Triggered reminder {} ({}) for user {}",
                        reminder.id, reminder.title, reminder.user_id
                    );
                }
            }
            Transition::Skip { .. } => {
                report.skipped += 1;
                debug!(
                    "Skipped reminder {} on a filtered day, next at {}",
                    reminder.id,
                    transition.next().next_trigger_time
                );
            }
        }

        let next = transition.into_next();
        let deactivated = reminder.is_active && !next.is_active;
        let id = next.id.clone();

        match self.store.replace(next).await {
            Ok(()) => {
                if deactivated {
                    report.deactivated += 1;
                    info!("Deactivated reminder {} ({})", id, reminder.title);
                }
            }
            Err(e) => {
                report.persistence_failures += 1;
                error!("Failed to persist reminder {id}: {e}");
            }
        }
    }

    async fn deliver(&self, reminder: &Reminder) -> Result<(), ReminderError> {
        let message = self.renderer.render(reminder);
        match tokio::time::timeout(
            self.config.delivery_timeout,
            self.notifier.deliver(&reminder.channel_id, &message),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ReminderError::delivery(
                reminder.channel_id.clone(),
                format!(
                    "timed out after {}s",
                    self.config.delivery_timeout.as_secs_f64()
                ),
            )),
        }
    }

    fn record_tick(&self, now: DateTime<Utc>, report: &TickReport) {
        if let Ok(mut status) = self.status.write() {
            status.ticks += 1;
            status.last_tick_at = Some(now);
            status.last_report = Some(report.clone());
        }
    }

    fn record_store_success(&self) {
        if let Ok(mut status) = self.status.write() {
            status.consecutive_store_failures = 0;
        }
    }

    fn record_store_failure(&self, e: &ReminderError) {
        if let Ok(mut status) = self.status.write() {
            status.consecutive_store_failures += 1;
            status.last_store_error = Some(e.to_string());
        }
    }
}
