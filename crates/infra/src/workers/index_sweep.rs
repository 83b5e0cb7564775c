use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use timetable_auth::SessionManager;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(j) = self.join.take() {
            let _ = j.await;
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(j) = self.join.take() {
            j.abort();
        }
    }
}

/// Periodic reverse-index hygiene.
///
/// - Runs `SessionManager::sweep_index` every `interval`
/// - A failed pass is logged and retried on the next tick
/// - Overlapping passes never happen (missed ticks are delayed, not burst)
#[derive(Debug)]
pub struct IndexSweepWorker;

impl IndexSweepWorker {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(sessions: Arc<SessionManager>, interval: Duration) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(sweep_loop(sessions, interval, shutdown_rx));

        WorkerHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

async fn sweep_loop(
    sessions: Arc<SessionManager>,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately; skip it so startup is not slowed by a sweep.
    ticker.tick().await;

    info!(interval_ms = interval.as_millis() as u64, "index sweep worker started");

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                match sessions.sweep_index().await {
                    Ok(report) if report.members_pruned > 0 => {
                        info!(
                            indexes = report.indexes_scanned,
                            pruned = report.members_pruned,
                            expired = report.expired_records_deleted,
                            "reverse index swept"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "reverse index sweep failed"),
                }
            }
        }
    }

    info!("index sweep worker stopped");
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use timetable_auth::{InMemorySessionStore, SessionConfig, SessionStore};
    use timetable_core::{ManualClock, PrincipalId, Role};

    use super::*;

    #[tokio::test]
    async fn worker_prunes_dangling_index_members() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(InMemorySessionStore::with_clock(clock.clone()));
        let sessions = Arc::new(
            SessionManager::with_clock(store.clone(), SessionConfig::default(), clock.clone())
                .unwrap(),
        );

        let live = sessions
            .issue(&PrincipalId::new("t1").unwrap(), Role::Teacher)
            .await
            .unwrap();
        store
            .set_add("principal-sessions:TEACHER:t1", "dangling")
            .await
            .unwrap();

        let handle = IndexSweepWorker::spawn(sessions.clone(), Duration::from_millis(10));

        let mut members = Vec::new();
        for _ in 0..100 {
            members = store
                .set_members("principal-sessions:TEACHER:t1")
                .await
                .unwrap();
            if members.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert_eq!(members, vec![live.token.as_str().to_string()]);
        clock.advance(TimeDelta::minutes(1));
        assert!(sessions.validate(&live.token).await);
    }

    #[tokio::test]
    async fn worker_survives_store_outages() {
        let store = Arc::new(InMemorySessionStore::new());
        let sessions =
            Arc::new(SessionManager::new(store.clone(), SessionConfig::default()).unwrap());
        store.set_available(false);

        let handle = IndexSweepWorker::spawn(sessions, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Still running: shutdown completes instead of reporting a panic.
        handle.shutdown().await;
    }
}
