//! [`ScheduleCoordinator`]: turns task schedules into executions.
//!
//! Three trigger sources feed one entry point:
//! - one sleeping loop per `cron` task, driven by the same cron parser
//!   that computes `next_execution`;
//! - a periodic poller that picks up `interval` tasks whose next
//!   execution has elapsed;
//! - one timer per future `once` task.
//!
//! Every firing goes through the lease (when a [`DistributedLock`] is
//! configured) and the task status check before reaching the
//! [`TaskExecutionService`]. Firings are spawned, so a long scan never
//! holds up the trigger that produced it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use steward_core::config::SchedulerConfig;
use steward_core::schedule::parse_cron;
use steward_core::{
    calculate_next_execution, Execution, ExecutionStatus, ExecutionType, QualityTask,
    ScheduleConfig, ScheduleType, TaskStatus,
};
use steward_execution::{TaskExecutionService, TaskStore, TaskUpdate};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SchedulerError};
use crate::lock::{with_lease, DistributedLock};

// ── Registry ────────────────────────────────────────────────────────

struct Registration {
    schedule_type: ScheduleType,
    /// Interval tasks have no handle; the poller serves them.
    handle: Option<JoinHandle<()>>,
}

impl Registration {
    fn cancel(self) {
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

#[derive(Default)]
struct Registry {
    running: bool,
    entries: HashMap<String, Registration>,
    poller: Option<JoinHandle<()>>,
}

impl Registry {
    fn remove(&mut self, task_id: &str) -> bool {
        match self.entries.remove(task_id) {
            Some(entry) => {
                entry.cancel();
                true
            }
            None => false,
        }
    }

    fn clear_entries(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.cancel();
        }
    }

    fn shutdown(&mut self) {
        self.running = false;
        self.clear_entries();
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// Marks a task as being run by this process until dropped.
struct InFlight<'a> {
    set: &'a StdMutex<HashSet<String>>,
    task_id: String,
}

impl<'a> InFlight<'a> {
    fn enter(set: &'a StdMutex<HashSet<String>>, task_id: &str) -> Option<Self> {
        let mut ids = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(task_id.to_string()) {
            return None;
        }
        Some(Self {
            set,
            task_id: task_id.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.task_id);
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Collects the optional collaborators of a [`ScheduleCoordinator`].
pub struct CoordinatorBuilder {
    config: SchedulerConfig,
    tasks: Arc<dyn TaskStore>,
    executor: Arc<TaskExecutionService>,
    lock: Option<Arc<dyn DistributedLock>>,
    clock: Arc<dyn Clock>,
}

impl CoordinatorBuilder {
    /// Share leases with other instances through `lock`. Without one the
    /// coordinator runs in single-instance mode.
    pub fn lock(mut self, lock: Arc<dyn DistributedLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> ScheduleCoordinator {
        ScheduleCoordinator {
            inner: Arc::new(Inner {
                config: self.config,
                tasks: self.tasks,
                executor: self.executor,
                lock: self.lock,
                clock: self.clock,
                registry: Mutex::new(Registry::default()),
                in_flight: StdMutex::new(HashSet::new()),
            }),
        }
    }
}

// ── Coordinator ─────────────────────────────────────────────────────

/// Owns the trigger registry of one coordinator instance.
///
/// Dropping the coordinator cancels all registered triggers. Executions
/// already in flight run to completion.
pub struct ScheduleCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: SchedulerConfig,
    tasks: Arc<dyn TaskStore>,
    executor: Arc<TaskExecutionService>,
    lock: Option<Arc<dyn DistributedLock>>,
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
    in_flight: StdMutex<HashSet<String>>,
}

impl ScheduleCoordinator {
    /// Single-instance coordinator on the system clock.
    pub fn new(
        config: SchedulerConfig,
        tasks: Arc<dyn TaskStore>,
        executor: Arc<TaskExecutionService>,
    ) -> Self {
        Self::builder(config, tasks, executor).build()
    }

    pub fn builder(
        config: SchedulerConfig,
        tasks: Arc<dyn TaskStore>,
        executor: Arc<TaskExecutionService>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            tasks,
            executor,
            lock: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Register every enabled cron, interval and once task and start the
    /// interval poller.
    ///
    /// Tasks with a broken schedule are logged and skipped; the rest
    /// still load.
    pub async fn start(&self) -> Result<()> {
        let mut registry = self.inner.registry.lock().await;
        if registry.running {
            return Err(SchedulerError::AlreadyStarted);
        }

        let tasks = self.inner.tasks.schedulable_tasks().await?;
        registry.running = true;
        let registered = self.inner.register_all(&mut registry, &tasks);
        registry.poller = Some(self.inner.spawn_poller());

        info!(
            instance = %self.inner.config.instance_id,
            registered,
            candidates = tasks.len(),
            poll_interval_secs = self.inner.config.poll_interval_secs,
            "schedule coordinator started"
        );
        Ok(())
    }

    /// Cancel all triggers. Executions already in flight are not interrupted.
    pub async fn stop(&self) -> Result<()> {
        let mut registry = self.inner.registry.lock().await;
        if !registry.running {
            return Err(SchedulerError::NotRunning);
        }
        registry.shutdown();
        info!(instance = %self.inner.config.instance_id, "schedule coordinator stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.inner.registry.lock().await.running
    }

    /// Registered task IDs with their schedule type, sorted by ID.
    pub async fn registered_tasks(&self) -> Vec<(String, ScheduleType)> {
        let registry = self.inner.registry.lock().await;
        let mut out: Vec<_> = registry
            .entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.schedule_type))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Run a task as a scheduled firing.
    ///
    /// Returns `None` when the run was skipped: the lease is held
    /// elsewhere, the task is disabled, or it is already running.
    pub async fn execute(&self, task_id: &str) -> Result<Option<Execution>> {
        self.inner.run(task_id, ExecutionType::Scheduled).await
    }

    /// Run a task immediately as a manual execution, under the same lease
    /// and status checks as a scheduled firing.
    pub async fn trigger_now(&self, task_id: &str) -> Result<Option<Execution>> {
        self.inner.run(task_id, ExecutionType::Manual).await
    }

    /// Register one task, replacing any existing registration for it.
    ///
    /// Returns `false` when the task has nothing to schedule (manual,
    /// disabled, or a `once` time already passed).
    pub async fn add_scheduled_task(&self, task: &QualityTask) -> Result<bool> {
        let mut registry = self.inner.registry.lock().await;
        if !registry.running {
            return Err(SchedulerError::NotRunning);
        }
        registry.remove(&task.id);
        self.inner.register(&mut registry, task)
    }

    /// Drop the registration of one task. Returns whether it was registered.
    pub async fn remove_scheduled_task(&self, task_id: &str) -> bool {
        let removed = self.inner.registry.lock().await.remove(task_id);
        if removed {
            info!(task_id, "scheduled task removed");
        }
        removed
    }

    /// Discard every registration and rebuild from the store.
    pub async fn reload_scheduled_tasks(&self) -> Result<usize> {
        let mut registry = self.inner.registry.lock().await;
        if !registry.running {
            return Err(SchedulerError::NotRunning);
        }
        let tasks = self.inner.tasks.schedulable_tasks().await?;
        registry.clear_entries();
        let registered = self.inner.register_all(&mut registry, &tasks);
        info!(registered, "scheduled tasks reloaded");
        Ok(registered)
    }

    /// Replace a task's schedule, persist its next execution and
    /// re-register it if the coordinator is running.
    pub async fn update_schedule(
        &self,
        task_id: &str,
        schedule: ScheduleConfig,
    ) -> Result<QualityTask> {
        schedule.validate()?;
        let next = calculate_next_execution(&schedule, self.inner.clock.now())?;
        let update = TaskUpdate {
            schedule: Some(schedule),
            next_execution: Some(next),
            ..TaskUpdate::default()
        };
        let task = self.inner.tasks.update_task(task_id, update).await?;

        let mut registry = self.inner.registry.lock().await;
        if registry.running {
            registry.remove(task_id);
            if task.is_enabled && ScheduleType::SCHEDULABLE.contains(&task.schedule.schedule_type) {
                self.inner.register(&mut registry, &task)?;
            }
        }
        info!(
            task_id,
            schedule_type = %task.schedule.schedule_type,
            next_execution = ?task.next_execution,
            "task schedule updated"
        );
        Ok(task)
    }

    /// Mark a running task cancelled.
    ///
    /// The scan in flight is not interrupted; its statistics are still
    /// recorded and the task keeps the `cancelled` status. Returns
    /// `false` if the task was not running.
    pub async fn stop_task(&self, task_id: &str) -> Result<bool> {
        let task = self.inner.tasks.get_task(task_id).await?;
        if task.status != TaskStatus::Running {
            return Ok(false);
        }
        self.inner
            .tasks
            .update_task(task_id, TaskUpdate::status(TaskStatus::Cancelled))
            .await?;
        info!(task_id, "task cancelled");
        Ok(true)
    }
}

impl Drop for ScheduleCoordinator {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.inner.registry.try_lock() {
            registry.shutdown();
        }
    }
}

// ── Internals ───────────────────────────────────────────────────────

impl Inner {
    fn register_all(self: &Arc<Self>, registry: &mut Registry, tasks: &[QualityTask]) -> usize {
        let mut registered = 0;
        for task in tasks {
            match self.register(registry, task) {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(e) => warn!(task_id = %task.id, error = %e, "task schedule rejected, skipping"),
            }
        }
        registered
    }

    fn register(self: &Arc<Self>, registry: &mut Registry, task: &QualityTask) -> Result<bool> {
        if !task.is_enabled {
            debug!(task_id = %task.id, "task disabled, not registered");
            return Ok(false);
        }
        let handle = match task.schedule.schedule_type {
            ScheduleType::Manual => return Ok(false),
            ScheduleType::Cron => Some(self.spawn_cron(task)?),
            ScheduleType::Interval => {
                task.schedule.interval_duration()?;
                None
            }
            ScheduleType::Once => match task.schedule.scheduled_time {
                Some(at) if at > self.clock.now() => Some(self.spawn_once(&task.id, at)),
                at => {
                    warn!(task_id = %task.id, scheduled_time = ?at, "once task has no future time, skipping");
                    return Ok(false);
                }
            },
        };

        registry.entries.insert(
            task.id.clone(),
            Registration {
                schedule_type: task.schedule.schedule_type,
                handle,
            },
        );
        debug!(task_id = %task.id, schedule_type = %task.schedule.schedule_type, "task registered");
        Ok(true)
    }

    fn spawn_cron(self: &Arc<Self>, task: &QualityTask) -> Result<JoinHandle<()>> {
        let schedule = parse_cron(task.schedule.cron_expression.as_deref().unwrap_or(""))?;
        let inner = Arc::clone(self);
        let task_id = task.id.clone();

        Ok(tokio::spawn(async move {
            let mut last_fired: Option<DateTime<Utc>> = None;
            loop {
                let now = inner.clock.now();
                let from = last_fired.map_or(now, |last| last.max(now));
                let Some(next) = schedule.after(&from).next() else {
                    debug!(task_id = %task_id, "cron schedule exhausted");
                    break;
                };
                tokio::time::sleep(until(next, inner.clock.now())).await;
                last_fired = Some(next);
                debug!(task_id = %task_id, fire_time = %next, "cron firing");
                inner.dispatch(task_id.clone());
            }
        }))
    }

    fn spawn_once(self: &Arc<Self>, task_id: &str, at: DateTime<Utc>) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let task_id = task_id.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(until(at, inner.clock.now())).await;
            inner.registry.lock().await.entries.remove(&task_id);
            debug!(task_id = %task_id, "once timer fired");
            inner.dispatch(task_id);
        })
    }

    fn spawn_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let period = Duration::from_secs(self.config.poll_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                inner.poll_due_intervals().await;
            }
        })
    }

    async fn poll_due_intervals(self: &Arc<Self>) {
        let due = match self.tasks.due_interval_tasks(self.clock.now()).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "failed to load due interval tasks");
                return;
            }
        };
        for task in due {
            if let Err(e) = task.schedule.interval_duration() {
                warn!(task_id = %task.id, error = %e, "interval task has an invalid interval, skipping");
                continue;
            }
            self.dispatch(task.id);
        }
    }

    /// Fire a scheduled run without waiting for it.
    fn dispatch(self: &Arc<Self>, task_id: String) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = inner.run(&task_id, ExecutionType::Scheduled).await {
                error!(task_id = %task_id, error = %e, "scheduled execution failed");
            }
        });
    }

    async fn run(&self, task_id: &str, execution_type: ExecutionType) -> Result<Option<Execution>> {
        let Some(_guard) = InFlight::enter(&self.in_flight, task_id) else {
            debug!(task_id, "task already in flight in this instance, skipping");
            return Ok(None);
        };

        let Some(lock) = &self.lock else {
            return self.run_unlocked(task_id, execution_type).await;
        };

        let key = self.config.lock_key(task_id);
        let ttl = Duration::from_secs(self.config.lock_ttl_secs);
        let refresh_every = Some(ttl / 3).filter(|period| !period.is_zero());
        match with_lease(
            lock.as_ref(),
            &key,
            ttl,
            refresh_every,
            self.run_unlocked(task_id, execution_type),
        )
        .await?
        {
            Some(result) => result,
            None => {
                warn!(task_id, key = %key, "lease held by another instance, skipping");
                Ok(None)
            }
        }
    }

    /// Status checks, execution and next-execution bookkeeping. The
    /// caller holds the lease if there is one.
    async fn run_unlocked(
        &self,
        task_id: &str,
        execution_type: ExecutionType,
    ) -> Result<Option<Execution>> {
        let task = self.tasks.get_task(task_id).await?;
        if !task.is_enabled {
            debug!(task_id, "task disabled, skipping");
            return Ok(None);
        }
        if task.status == TaskStatus::Running {
            warn!(task_id, "task already running, skipping");
            return Ok(None);
        }

        let triggered_by = match execution_type {
            ExecutionType::Scheduled => format!("scheduler:{}", self.config.instance_id),
            ExecutionType::Manual => format!("manual:{}", self.config.instance_id),
        };
        let executor = Arc::clone(&self.executor);
        let id = task.id.clone();
        // Spawned so a panic inside the scan surfaces as a JoinError and
        // the lease is still released.
        let handle = tokio::spawn(async move {
            executor.start_task(&id, execution_type, &triggered_by).await
        });

        let outcome = match handle.await {
            Ok(Ok(execution)) => Ok(Some(execution)),
            Ok(Err(e)) => {
                // The executor could not release the task itself.
                if matches!(self.tasks.get_task(task_id).await, Ok(t) if t.status == TaskStatus::Running)
                {
                    self.mark_aborted(task_id, &e.to_string()).await;
                }
                Err(SchedulerError::from(e))
            }
            Err(e) => {
                error!(task_id, error = %e, "execution aborted");
                self.mark_aborted(task_id, &e.to_string()).await;
                Ok(None)
            }
        };

        if let Err(e) = self.persist_next_execution(task_id).await {
            warn!(task_id, error = %e, "failed to update next execution");
        }
        outcome
    }

    async fn persist_next_execution(&self, task_id: &str) -> Result<()> {
        let task = self.tasks.get_task(task_id).await?;
        let next = calculate_next_execution(&task.schedule, self.clock.now())?;
        self.tasks
            .update_task(task_id, TaskUpdate::next_execution(next))
            .await?;
        debug!(task_id, next_execution = ?next, "next execution persisted");
        Ok(())
    }

    /// Close out a run whose executor task died before finishing.
    async fn mark_aborted(&self, task_id: &str, reason: &str) {
        let now = self.clock.now();
        match self.tasks.executions_for_task(task_id).await {
            Ok(executions) => {
                for mut execution in executions
                    .into_iter()
                    .filter(|e| e.status == ExecutionStatus::Running)
                {
                    execution.status = ExecutionStatus::Failed;
                    execution.error_message = Some(format!("execution aborted: {}", reason));
                    execution.end_time = Some(now);
                    if let Err(e) = self.tasks.save_execution(&execution).await {
                        error!(task_id, execution_id = %execution.id, error = %e, "failed to close aborted execution");
                    }
                }
            }
            Err(e) => error!(task_id, error = %e, "failed to load executions"),
        }

        let status = match self.tasks.get_task(task_id).await {
            Ok(task) if task.status == TaskStatus::Cancelled => None,
            _ => Some(TaskStatus::Failed),
        };
        let update = TaskUpdate {
            status,
            last_executed: Some(now),
            record_run: Some(ExecutionStatus::Failed),
            ..TaskUpdate::default()
        };
        if let Err(e) = self.tasks.update_task(task_id, update).await {
            error!(task_id, error = %e, "failed to record aborted execution");
        }
    }
}

fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}
