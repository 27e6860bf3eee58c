use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::events::{SessionEvent, SessionSubscription};
use super::session::BuildSession;
use crate::errors::SessionError;

const EVENT_CAPACITY: usize = 256;

struct SessionEntry {
    snapshot: watch::Receiver<BuildSession>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionEntry {
    /// Cancel the session task, wait for it to tear down, and return the
    /// final snapshot.
    async fn stop(self, id: &str) -> BuildSession {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(session_id = %id, error = %e, "session task ended abnormally");
        }
        let mut session = self.snapshot.borrow().clone();
        if !session.is_finished() || session.running_step().is_some() {
            session.cancel();
        }
        session
    }
}

/// Directory of build-validation sessions, keyed by session id.
///
/// Each entry holds a read-only view of the session (its task is the only
/// writer), the task's cancellation token, and its join handle. Shared as
/// `Arc<ValidationSessionRegistry>`.
pub struct ValidationSessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for ValidationSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationSessionRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sessions: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    pub(crate) async fn register(
        &self,
        id: String,
        snapshot: watch::Receiver<BuildSession>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            id,
            SessionEntry {
                snapshot,
                cancel,
                task,
            },
        );
    }

    /// Latest snapshot of a session.
    pub async fn status(&self, id: &str) -> Result<BuildSession, SessionError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(id)
            .map(|entry| entry.snapshot.borrow().clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Snapshots of every known session, oldest first.
    pub async fn list(&self) -> Vec<BuildSession> {
        let sessions = self.sessions.lock().await;
        let mut all: Vec<BuildSession> = sessions
            .values()
            .map(|entry| entry.snapshot.borrow().clone())
            .collect();
        all.sort_by_key(|s| s.started_at);
        all
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Wait until a session reaches `completed` or `failed`.
    pub async fn wait(&self, id: &str) -> Result<BuildSession, SessionError> {
        let mut rx = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(id)
                .map(|entry| entry.snapshot.clone())
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?
        };
        let finished = rx
            .wait_for(BuildSession::is_finished)
            .await
            .map(|session| session.clone());
        // Sender gone without finishing: report the last published state.
        Ok(finished.unwrap_or_else(|_| rx.borrow().clone()))
    }

    /// Cancel a session at whatever step it is in, tear down its sandbox,
    /// and drop it from the registry. Returns once teardown has finished.
    pub async fn cancel(&self, id: &str) -> Result<BuildSession, SessionError> {
        let entry = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(id)
        };
        let entry = entry.ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        tracing::info!(session_id = %id, "cancelling validation session");
        Ok(entry.stop(id).await)
    }

    /// Drop a finished session, releasing its preview server.
    pub async fn remove(&self, id: &str) -> Result<BuildSession, SessionError> {
        let entry = {
            let mut sessions = self.sessions.lock().await;
            let finished = sessions
                .get(id)
                .map(|entry| entry.snapshot.borrow().is_finished());
            match finished {
                None => return Err(SessionError::NotFound(id.to_string())),
                Some(false) => return Err(SessionError::StillRunning(id.to_string())),
                Some(true) => sessions.remove(id),
            }
        };
        match entry {
            Some(entry) => Ok(entry.stop(id).await),
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    /// Remove finished sessions that ended more than `max_age` ago.
    /// Returns how many were removed.
    pub async fn prune_finished(&self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };
        let expired: Vec<(String, SessionEntry)> = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| {
                    let session = entry.snapshot.borrow();
                    session.is_finished() && session.ended_at.is_some_and(|t| t <= cutoff)
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let count = expired.len();
        for (id, entry) in expired {
            entry.stop(&id).await;
        }
        if count > 0 {
            tracing::info!(count, "pruned finished validation sessions");
        }
        count
    }

    /// Cancel every session and wait for all of them to tear down.
    pub async fn shutdown(&self) {
        let entries: Vec<(String, SessionEntry)> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().collect()
        };
        if entries.is_empty() {
            return;
        }
        tracing::info!(count = entries.len(), "shutting down validation sessions");
        let stops = entries
            .into_iter()
            .map(|(id, entry)| async move { entry.stop(&id).await });
        join_all(stops).await;
    }

    /// Events for one session.
    pub fn subscribe(&self, id: &str) -> SessionSubscription {
        SessionSubscription::new(id, self.events.subscribe())
    }

    /// Events for every session.
    pub fn subscribe_all(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
