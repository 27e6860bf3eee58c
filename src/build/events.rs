use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::session::StepKind;

/// Progress notifications for build-validation sessions.
///
/// Delivery is best-effort: a slow subscriber may miss events. The session
/// snapshot from `status` is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: String,
    },
    Progress {
        session_id: String,
        step: StepKind,
        percent: u8,
    },
    Complete {
        session_id: String,
        file_count: usize,
        preview_url: String,
    },
    Error {
        session_id: String,
        message: String,
    },
    Cancelled {
        session_id: String,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Started { session_id }
            | Self::Progress { session_id, .. }
            | Self::Complete { session_id, .. }
            | Self::Error { session_id, .. }
            | Self::Cancelled { session_id } => session_id,
        }
    }

    /// Whether no further events follow for this session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. } | Self::Cancelled { .. })
    }
}

/// Send an event, ignoring the case where nobody is listening.
pub fn publish(tx: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    tracing::trace!(session_id = event.session_id(), ?event, "session event");
    let _ = tx.send(event);
}

/// Receiver that yields only one session's events.
pub struct SessionSubscription {
    session_id: String,
    rx: broadcast::Receiver<SessionEvent>,
    done: bool,
}

impl SessionSubscription {
    pub(crate) fn new(session_id: impl Into<String>, rx: broadcast::Receiver<SessionEvent>) -> Self {
        Self {
            session_id: session_id.into(),
            rx,
            done: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next event for this session. Returns `None` after a terminal event
    /// or once the registry is gone. Missed events are skipped.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        if self.done {
            return None;
        }
        loop {
            match self.rx.recv().await {
                Ok(event) if event.session_id() == self.session_id => {
                    self.done = event.is_terminal();
                    return Some(event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(session_id = %self.session_id, skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::Progress {
            session_id: "abc".into(),
            step: StepKind::InstallDependencies,
            percent: 40,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["data"]["step"], "install_dependencies");
        assert_eq!(json["data"]["percent"], 40);
    }

    #[tokio::test]
    async fn test_subscription_filters_by_session() {
        let (tx, _) = broadcast::channel(16);
        let mut sub = SessionSubscription::new("a", tx.subscribe());
        publish(&tx, SessionEvent::Started { session_id: "b".into() });
        publish(&tx, SessionEvent::Started { session_id: "a".into() });
        publish(&tx, SessionEvent::Cancelled { session_id: "a".into() });
        publish(&tx, SessionEvent::Started { session_id: "a".into() });

        assert_eq!(sub.recv().await, Some(SessionEvent::Started { session_id: "a".into() }));
        assert_eq!(sub.recv().await, Some(SessionEvent::Cancelled { session_id: "a".into() }));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let (tx, rx) = broadcast::channel(1);
        drop(rx);
        publish(&tx, SessionEvent::Started { session_id: "a".into() });
    }

    #[tokio::test]
    async fn test_subscription_ends_when_sender_dropped() {
        let (tx, _) = broadcast::channel::<SessionEvent>(4);
        let mut sub = SessionSubscription::new("a", tx.subscribe());
        drop(tx);
        assert_eq!(sub.recv().await, None);
    }
}
