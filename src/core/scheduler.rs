//! Durable scheduler - time-triggered tasks that survive restarts.
//!
//! Tasks live in `scheduled_tasks` and are pending until the driver marks them
//! completed. Each due task is handled in its own database transaction: the
//! purchase state transition and the completion flag commit together. State
//! transitions are conditional updates, so a task replayed after a crash finds
//! its transition already applied and is only marked completed.
//!
//! Outward notifications go through [`EffectNotifier`]. A delayed broadcast is the
//! paid effect itself, so it is posted before its transaction commits: a failed
//! post leaves the task pending for the next tick, and a crash between post and
//! commit posts it again. Expiry notices are informational and are sent after the
//! commit, only by the run that applied the transition.

use crate::{
    config::SchedulerConfig,
    core::store::Store,
    entities::{Purchase, PurchaseStatus, ScheduledTask, TaskData, TaskType, purchase, scheduled_task},
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// A task to be scheduled.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// User the task acts for
    pub user_id: String,
    /// Channel to notify
    pub chat_id: String,
    /// Earliest time the task may run
    pub fire_at: DateTime<Utc>,
    /// Handler payload; also decides the task type
    pub data: TaskData,
}

/// Persists a pending task.
///
/// Works on any connection, so the purchase engine can schedule inside its own
/// transaction. A `fire_at` in the past is allowed and runs on the next tick.
pub async fn schedule<C>(db: &C, task: NewTask, now: DateTime<Utc>) -> Result<scheduled_task::Model>
where
    C: ConnectionTrait,
{
    if task.chat_id.trim().is_empty() {
        return Err(Error::InvalidRequest {
            message: "scheduled task needs a chat to notify".to_string(),
        });
    }

    let model = scheduled_task::ActiveModel {
        user_id: Set(task.user_id),
        chat_id: Set(task.chat_id),
        task_type: Set(task.data.task_type()),
        fire_at: Set(task.fire_at),
        data: Set(task.data),
        completed: Set(false),
        completed_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!(task_id = model.id, task_type = ?model.task_type, fire_at = %model.fire_at, "Task scheduled");
    Ok(model)
}

/// Pending tasks with `fire_at <= now`, earliest first, leaving out `skip`.
pub async fn due_tasks<C>(
    db: &C,
    now: DateTime<Utc>,
    limit: u64,
    skip: &HashSet<i64>,
) -> Result<Vec<scheduled_task::Model>>
where
    C: ConnectionTrait,
{
    let mut query = ScheduledTask::find()
        .filter(scheduled_task::Column::Completed.eq(false))
        .filter(scheduled_task::Column::FireAt.lte(now));
    if !skip.is_empty() {
        query = query.filter(scheduled_task::Column::Id.is_not_in(skip.iter().copied()));
    }
    query
        .order_by_asc(scheduled_task::Column::FireAt)
        .order_by_asc(scheduled_task::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Pending tasks of one user, earliest first.
pub async fn pending_tasks<C>(db: &C, user_id: &str) -> Result<Vec<scheduled_task::Model>>
where
    C: ConnectionTrait,
{
    ScheduledTask::find()
        .filter(scheduled_task::Column::UserId.eq(user_id))
        .filter(scheduled_task::Column::Completed.eq(false))
        .order_by_asc(scheduled_task::Column::FireAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a task completed. Returns `false` if it already was.
pub async fn mark_completed<C>(db: &C, task_id: i64, now: DateTime<Utc>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = ScheduledTask::update_many()
        .col_expr(scheduled_task::Column::Completed, Expr::value(true))
        .col_expr(scheduled_task::Column::CompletedAt, Expr::value(Some(now)))
        .filter(scheduled_task::Column::Id.eq(task_id))
        .filter(scheduled_task::Column::Completed.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Whether running a task's handler changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectOutcome {
    /// The purchase moved to its next state
    Applied,
    /// The purchase was already in the target state
    AlreadyApplied,
}

/// Applies the state transition a task stands for.
///
/// `expire_effect` moves the purchase from active to expired,
/// `delayed_broadcast` from active to delivered. Running it twice is harmless.
///
/// # Errors
/// [`Error::InvariantViolation`] if the purchase is missing, belongs to another
/// user, or sits in a state the transition cannot reach.
pub async fn apply_task_effect<C>(db: &C, task: &scheduled_task::Model) -> Result<EffectOutcome>
where
    C: ConnectionTrait,
{
    if task.data.task_type() != task.task_type {
        return Err(Error::InvariantViolation {
            message: format!("task {} type does not match its payload", task.id),
        });
    }

    let purchase_id = task.data.purchase_id();
    let target = match task.data {
        TaskData::ExpireEffect { .. } => PurchaseStatus::Expired,
        TaskData::DelayedBroadcast { .. } => PurchaseStatus::Delivered,
    };

    let result = Purchase::update_many()
        .col_expr(purchase::Column::Status, Expr::value(target))
        .filter(purchase::Column::Id.eq(purchase_id))
        .filter(purchase::Column::UserId.eq(task.user_id.as_str()))
        .filter(purchase::Column::Status.eq(PurchaseStatus::Active))
        .exec(db)
        .await?;
    if result.rows_affected == 1 {
        return Ok(EffectOutcome::Applied);
    }

    match Purchase::find_by_id(purchase_id).one(db).await? {
        Some(p) if p.user_id == task.user_id && p.status == target => Ok(EffectOutcome::AlreadyApplied),
        Some(p) => Err(Error::InvariantViolation {
            message: format!(
                "task {} cannot move purchase {} from {:?} to {target:?}",
                task.id, p.id, p.status
            ),
        }),
        None => Err(Error::InvariantViolation {
            message: format!("task {} references missing purchase {purchase_id}", task.id),
        }),
    }
}

/// Whether the purchase behind a task is still waiting for the task's transition.
pub async fn is_effect_pending<C>(db: &C, task: &scheduled_task::Model) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(Purchase::find_by_id(task.data.purchase_id())
        .one(db)
        .await?
        .is_some_and(|p| p.user_id == task.user_id && p.status == PurchaseStatus::Active))
}

/// Applies a task's transition and marks it completed in one transaction.
pub async fn complete_task<C>(db: &C, task: &scheduled_task::Model, now: DateTime<Utc>) -> Result<EffectOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let outcome = apply_task_effect(&txn, task).await?;
    if !mark_completed(&txn, task.id, now).await? {
        // Finished by someone else since it was loaded
        return Ok(EffectOutcome::AlreadyApplied);
    }
    txn.commit().await?;
    Ok(outcome)
}

/// Fired effect handed to the chat layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectActivation {
    /// Task that fired
    pub task_id: i64,
    /// User the task acted for
    pub user_id: String,
    /// Channel to notify
    pub chat_id: String,
    /// Kind of work
    pub task_type: TaskType,
    /// Handler payload
    pub data: TaskData,
}

impl From<&scheduled_task::Model> for EffectActivation {
    fn from(task: &scheduled_task::Model) -> Self {
        Self {
            task_id: task.id,
            user_id: task.user_id.clone(),
            chat_id: task.chat_id.clone(),
            task_type: task.task_type,
            data: task.data.clone(),
        }
    }
}

/// Receives effect activations.
#[async_trait]
pub trait EffectNotifier: Send + Sync {
    /// Delivers one activation.
    ///
    /// For a delayed broadcast an error keeps the task pending and it is offered
    /// again on the next tick. For an expiry the error is only logged.
    async fn notify(&self, activation: &EffectActivation) -> Result<()>;
}

/// Counts from one pass over the due tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tasks marked completed
    pub completed: usize,
    /// Of those, tasks whose transition this pass applied
    pub applied: usize,
    /// Tasks that failed and stay pending
    pub failed: usize,
}

/// Driver that executes due tasks on a fixed tick.
pub struct Scheduler {
    store: Store,
    notifier: Arc<dyn EffectNotifier>,
    config: SchedulerConfig,
    quarantined: HashSet<i64>,
}

impl Scheduler {
    /// Creates a driver over `store`.
    #[must_use]
    pub fn new(store: Store, notifier: Arc<dyn EffectNotifier>, config: SchedulerConfig) -> Self {
        Self {
            store,
            notifier,
            config,
            quarantined: HashSet::new(),
        }
    }

    /// Task ids skipped until restart because their data is inconsistent.
    #[must_use]
    pub const fn quarantined(&self) -> &HashSet<i64> {
        &self.quarantined
    }

    /// Runs every task due at `now`, at most one batch.
    ///
    /// One task failing does not stop the others. A task whose handler reports an
    /// invariant violation is quarantined: it is left out of later batches so it
    /// cannot hold back the tasks behind it.
    #[instrument(skip(self))]
    pub async fn process_due_tasks(&mut self, now: DateTime<Utc>) -> Result<TickReport> {
        let db = self.store.connection();
        let limit = self.config.batch_size;
        let skip = &self.quarantined;
        let due = self
            .store
            .run("load due tasks", move || due_tasks(db, now, limit, skip))
            .await?;

        let mut report = TickReport::default();
        for task in &due {
            match self.process_task(task, now).await {
                Ok(outcome) => {
                    report.completed += 1;
                    if outcome == EffectOutcome::Applied {
                        report.applied += 1;
                    }
                }
                Err(err @ Error::InvariantViolation { .. }) => {
                    error!(task_id = task.id, error = %err, "Quarantining inconsistent task");
                    self.quarantined.insert(task.id);
                    report.failed += 1;
                }
                Err(err) => {
                    warn!(task_id = task.id, error = %err, "Task failed, will retry next tick");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn process_task(&self, task: &scheduled_task::Model, now: DateTime<Utc>) -> Result<EffectOutcome> {
        let db = self.store.connection();
        let activation = EffectActivation::from(task);

        if let TaskData::DelayedBroadcast { .. } = task.data {
            let pending = self
                .store
                .run("check task", move || is_effect_pending(db, task))
                .await?;
            if pending {
                self.notifier.notify(&activation).await.inspect_err(|err| {
                    warn!(task_id = task.id, error = %err, "Broadcast not delivered, task stays pending");
                })?;
            }
        }

        let outcome = self
            .store
            .run("complete task", move || complete_task(db, task, now))
            .await?;

        match outcome {
            EffectOutcome::Applied => {
                debug!(task_id = task.id, task_type = ?task.task_type, "Task applied");
                if let TaskData::ExpireEffect { .. } = task.data {
                    if let Err(err) = self.notifier.notify(&activation).await {
                        warn!(task_id = task.id, error = %err, "Expiry notification failed");
                    }
                }
            }
            EffectOutcome::AlreadyApplied => {
                info!(task_id = task.id, "Task effect was already applied, marked completed");
            }
        }
        Ok(outcome)
    }

    /// Ticks until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let tick = self.config.tick();
        info!(?tick, batch_size = self.config.batch_size, "Scheduler started");

        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match self.process_due_tasks(Utc::now()).await {
                        Ok(report) if report.completed > 0 || report.failed > 0 => {
                            info!(
                                completed = report.completed,
                                applied = report.applied,
                                failed = report.failed,
                                "Scheduler tick"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => error!(error = %err, "Scheduler tick failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::purchase::{PurchaseRequest, purchase_at};
    use crate::core::store::RetryPolicy;
    use crate::test_utils::*;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn scheduler(db: &DatabaseConnection, notifier: Arc<RecordingNotifier>) -> Scheduler {
        scheduler_with(db, notifier, SchedulerConfig::default())
    }

    fn scheduler_with(
        db: &DatabaseConnection,
        notifier: Arc<RecordingNotifier>,
        config: SchedulerConfig,
    ) -> Scheduler {
        Scheduler::new(Store::new(db.clone(), RetryPolicy::no_retry()), notifier, config)
    }

    async fn buy_broadcast(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<i64> {
        create_funded_user(db, "1", 100).await?;
        create_test_item(db, broadcast_item("Shout", 30, 600)).await?;
        let receipt = purchase_at(
            db,
            &PurchaseRequest {
                user_id: "1".to_string(),
                selector: crate::core::catalog::ItemSelector::Ordinal(1),
                chat_id: "general".to_string(),
                message: Some("hi all".to_string()),
            },
            now,
        )
        .await?;
        Ok(receipt.purchase_id)
    }

    fn orphan_task(purchase_id: i64) -> NewTask {
        NewTask {
            user_id: "1".to_string(),
            chat_id: "chat-1".to_string(),
            fire_at: at(9),
            data: TaskData::ExpireEffect {
                purchase_id,
                action: "stickers".to_string(),
            },
        }
    }

    async fn buy_timed_pass(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<i64> {
        create_funded_user(db, "1", 150).await?;
        create_test_item(db, timed_item("Sticker Pass", 100, "stickers", 86_400)).await?;
        let receipt = purchase_at(
            db,
            &PurchaseRequest {
                user_id: "1".to_string(),
                selector: crate::core::catalog::ItemSelector::Ordinal(1),
                chat_id: "chat-1".to_string(),
                message: None,
            },
            now,
        )
        .await?;
        Ok(receipt.purchase_id)
    }

    #[tokio::test]
    async fn test_expiry_fires_exactly_once_at_fire_time() -> Result<()> {
        let db = setup_test_db().await?;
        let purchase_id = buy_timed_pass(&db, at(10)).await?;
        let notifier = Arc::new(RecordingNotifier::default());
        let mut driver = scheduler(&db, Arc::clone(&notifier));

        let early = driver
            .process_due_tasks(at(10) + Duration::hours(24) - Duration::seconds(1))
            .await?;
        assert_eq!(early, TickReport::default());
        assert!(notifier.activations().is_empty());

        let report = driver.process_due_tasks(at(10) + Duration::hours(24)).await?;
        assert_eq!(report.completed, 1);
        assert_eq!(report.applied, 1);

        let activations = notifier.activations();
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].user_id, "1");
        assert_eq!(activations[0].chat_id, "chat-1");
        assert_eq!(activations[0].task_type, TaskType::ExpireEffect);
        assert_eq!(
            activations[0].data,
            TaskData::ExpireEffect {
                purchase_id,
                action: "stickers".to_string()
            }
        );

        let stored = Purchase::find_by_id(purchase_id).one(&db).await?.unwrap();
        assert_eq!(stored.status, PurchaseStatus::Expired);

        let again = driver.process_due_tasks(at(10) + Duration::hours(48)).await?;
        assert_eq!(again, TickReport::default());
        assert_eq!(notifier.activations().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_replay_after_crash_does_not_reapply() -> Result<()> {
        let db = setup_test_db().await?;
        let purchase_id = buy_timed_pass(&db, at(10)).await?;
        let due_at = at(10) + Duration::hours(24);

        // Handler ran but the process died before completion was recorded
        let task = due_tasks(&db, due_at, 10, &HashSet::new())
            .await?
            .pop()
            .unwrap();
        assert_eq!(apply_task_effect(&db, &task).await?, EffectOutcome::Applied);

        let notifier = Arc::new(RecordingNotifier::default());
        let mut driver = scheduler(&db, Arc::clone(&notifier));
        let report = driver.process_due_tasks(due_at + Duration::minutes(5)).await?;

        assert_eq!(report.completed, 1);
        assert_eq!(report.applied, 0);
        assert!(notifier.activations().is_empty());

        let stored_task = ScheduledTask::find_by_id(task.id).one(&db).await?.unwrap();
        assert!(stored_task.completed);
        assert_eq!(
            stored_task.completed_at,
            Some(due_at + Duration::minutes(5))
        );
        let stored = Purchase::find_by_id(purchase_id).one(&db).await?.unwrap();
        assert_eq!(stored.status, PurchaseStatus::Expired);
        Ok(())
    }

    #[tokio::test]
    async fn test_tasks_missed_while_down_run_on_next_tick() -> Result<()> {
        let db = setup_test_db().await?;
        buy_timed_pass(&db, at(10)).await?;
        let notifier = Arc::new(RecordingNotifier::default());
        let mut driver = scheduler(&db, Arc::clone(&notifier));

        // First tick after a week of downtime
        let report = driver.process_due_tasks(at(10) + Duration::days(7)).await?;
        assert_eq!(report.applied, 1);
        assert_eq!(notifier.activations().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_completion_is_monotonic() -> Result<()> {
        let db = setup_test_db().await?;
        buy_timed_pass(&db, at(10)).await?;
        let task = pending_tasks(&db, "1").await?.pop().unwrap();

        assert!(mark_completed(&db, task.id, at(12)).await?);
        assert!(!mark_completed(&db, task.id, at(13)).await?);

        let stored = ScheduledTask::find_by_id(task.id).one(&db).await?.unwrap();
        assert!(stored.completed);
        assert_eq!(stored.completed_at, Some(at(12)));
        assert!(pending_tasks(&db, "1").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_broadcast_task_delivers_purchase() -> Result<()> {
        let db = setup_test_db().await?;
        let purchase_id = buy_broadcast(&db, at(10)).await?;

        let notifier = Arc::new(RecordingNotifier::default());
        let mut driver = scheduler(&db, Arc::clone(&notifier));
        driver.process_due_tasks(at(10) + Duration::minutes(10)).await?;

        let activations = notifier.activations();
        assert_eq!(activations.len(), 1);
        assert_eq!(
            activations[0].data,
            TaskData::DelayedBroadcast {
                purchase_id,
                message: "hi all".to_string()
            }
        );
        let stored = Purchase::find_by_id(purchase_id).one(&db).await?.unwrap();
        assert_eq!(stored.status, PurchaseStatus::Delivered);
        Ok(())
    }

    #[tokio::test]
    async fn test_inconsistent_task_is_quarantined_and_others_run() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        buy_timed_pass(&db, at(10)).await?;
        let orphan = schedule(&db, orphan_task(999), at(9)).await?;

        let notifier = Arc::new(RecordingNotifier::default());
        let mut driver = scheduler(&db, Arc::clone(&notifier));
        let report = driver.process_due_tasks(at(10) + Duration::days(1)).await?;
        assert_eq!(report.failed, 1);
        assert_eq!(report.applied, 1);
        assert!(driver.quarantined().contains(&orphan.id));

        let stored = ScheduledTask::find_by_id(orphan.id).one(&db).await?.unwrap();
        assert!(!stored.completed);

        let next = driver.process_due_tasks(at(10) + Duration::days(2)).await?;
        assert_eq!(next, TickReport::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_quarantined_tasks_do_not_block_later_tasks() -> Result<()> {
        let db = setup_test_db().await?;
        let purchase_id = buy_timed_pass(&db, at(10)).await?;
        // Due before the valid expiry, so it heads every batch
        let orphan = schedule(&db, orphan_task(999), at(9)).await?;

        let notifier = Arc::new(RecordingNotifier::default());
        let config = SchedulerConfig {
            batch_size: 1,
            ..SchedulerConfig::default()
        };
        let mut driver = scheduler_with(&db, Arc::clone(&notifier), config);

        let first = driver.process_due_tasks(at(10) + Duration::days(1)).await?;
        assert_eq!(first.failed, 1);
        assert!(driver.quarantined().contains(&orphan.id));

        let second = driver.process_due_tasks(at(10) + Duration::days(1)).await?;
        assert_eq!(second.applied, 1);
        assert_eq!(notifier.activations().len(), 1);

        let stored = Purchase::find_by_id(purchase_id).one(&db).await?.unwrap();
        assert_eq!(stored.status, PurchaseStatus::Expired);
        Ok(())
    }

    #[tokio::test]
    async fn test_expiry_state_survives_failing_notifier() -> Result<()> {
        let db = setup_test_db().await?;
        let purchase_id = buy_timed_pass(&db, at(10)).await?;
        let notifier = Arc::new(RecordingNotifier::failing());
        let mut driver = scheduler(&db, Arc::clone(&notifier));

        let report = driver.process_due_tasks(at(10) + Duration::days(1)).await?;
        assert_eq!(report.applied, 1);
        let stored = Purchase::find_by_id(purchase_id).one(&db).await?.unwrap();
        assert_eq!(stored.status, PurchaseStatus::Expired);
        assert!(
            due_tasks(&db, at(10) + Duration::days(2), 10, &HashSet::new())
                .await?
                .is_empty()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_undelivered_broadcast_is_retried_next_tick() -> Result<()> {
        let db = setup_test_db().await?;
        let purchase_id = buy_broadcast(&db, at(10)).await?;
        let fire_time = at(10) + Duration::minutes(10);

        let offline = Arc::new(RecordingNotifier::failing());
        let mut driver = scheduler(&db, Arc::clone(&offline));
        let report = driver.process_due_tasks(fire_time).await?;
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 0);
        assert!(driver.quarantined().is_empty());

        let stored = Purchase::find_by_id(purchase_id).one(&db).await?.unwrap();
        assert_eq!(stored.status, PurchaseStatus::Active);
        assert_eq!(pending_tasks(&db, "1").await?.len(), 1);

        let online = Arc::new(RecordingNotifier::default());
        let mut driver = scheduler(&db, Arc::clone(&online));
        let report = driver.process_due_tasks(fire_time + Duration::seconds(30)).await?;
        assert_eq!(report.applied, 1);
        assert_eq!(online.activations().len(), 1);

        let stored = Purchase::find_by_id(purchase_id).one(&db).await?.unwrap();
        assert_eq!(stored.status, PurchaseStatus::Delivered);
        assert!(pending_tasks(&db, "1").await?.is_empty());

        // Nothing is posted again once the task is completed
        driver.process_due_tasks(fire_time + Duration::hours(1)).await?;
        assert_eq!(online.activations().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_schedule_rejects_blank_chat() -> Result<()> {
        let db = setup_test_db().await?;
        create_funded_user(&db, "1", 0).await?;
        let result = schedule(
            &db,
            NewTask {
                user_id: "1".to_string(),
                chat_id: " ".to_string(),
                fire_at: at(10),
                data: TaskData::DelayedBroadcast {
                    purchase_id: 1,
                    message: "x".to_string(),
                },
            },
            at(9),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_run_processes_due_tasks_until_cancelled() -> Result<()> {
        let db = setup_test_db().await?;
        // Bought long ago, so the expiry is already due in wall-clock time
        buy_timed_pass(&db, Utc::now() - Duration::days(2)).await?;
        let notifier = Arc::new(RecordingNotifier::default());
        let driver = scheduler(&db, Arc::clone(&notifier));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(driver.run(shutdown.clone()));

        for _ in 0..100 {
            if !notifier.activations().is_empty() {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(notifier.activations().len(), 1);
        Ok(())
    }
}
