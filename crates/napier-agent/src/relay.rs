//! Ordered delivery of turn progress to a single observer.
//!
//! Every turn produces exactly this sequence:
//!
//! ```text
//! Ack ─▶ Progress* ─▶ (Success | Error)
//! ```
//!
//! [`TurnRelay::succeed`] and [`TurnRelay::fail`] consume the relay, so a
//! second terminal event cannot be written. A relay dropped without either
//! emits `Error("turn aborted")`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Message used when a relay is dropped mid-turn.
pub const ABORTED_MESSAGE: &str = "turn aborted";

/// Which step of the turn a progress event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    /// The model's answer to the user's query.
    Response,
    /// Output of a tool invocation.
    ToolResult,
    /// The model's interpretation of a tool result.
    FollowUp,
}

/// One event of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayEvent {
    Ack {
        query: String,
        timestamp: DateTime<Utc>,
    },
    Progress {
        stage: ProgressStage,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Success {
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl RelayEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Ack { timestamp, .. }
            | Self::Progress { timestamp, .. }
            | Self::Success { timestamp }
            | Self::Error { timestamp, .. } => *timestamp,
        }
    }

    /// True for `Success` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }
}

/// Receiving half handed to the observer.
pub type RelayReceiver = mpsc::UnboundedReceiver<RelayEvent>;

/// Sending half of one turn's event stream.
#[derive(Debug)]
pub struct TurnRelay {
    tx: Option<mpsc::UnboundedSender<RelayEvent>>,
}

impl TurnRelay {
    /// Open a channel for a turn and emit its `Ack`.
    pub fn start(query: impl Into<String>) -> (Self, RelayReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_sender(tx, query), rx)
    }

    /// Emit `Ack` on an existing channel.
    pub fn with_sender(tx: mpsc::UnboundedSender<RelayEvent>, query: impl Into<String>) -> Self {
        let relay = Self { tx: Some(tx) };
        relay.send(RelayEvent::Ack {
            query: query.into(),
            timestamp: Utc::now(),
        });
        relay
    }

    pub fn progress(&self, stage: ProgressStage, text: impl Into<String>, tool: Option<&str>) {
        self.send(RelayEvent::Progress {
            stage,
            text: text.into(),
            tool: tool.map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    pub fn succeed(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(RelayEvent::Success {
                timestamp: Utc::now(),
            });
        }
    }

    pub fn fail(mut self, message: impl Into<String>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(RelayEvent::Error {
                message: message.into(),
                timestamp: Utc::now(),
            });
        }
    }

    /// Sends to a departed observer are dropped.
    fn send(&self, event: RelayEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

impl Drop for TurnRelay {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tracing::debug!("Relay dropped before a terminal event");
            let _ = tx.send(RelayEvent::Error {
                message: ABORTED_MESSAGE.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut RelayReceiver) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_ack_progress_success_order() {
        let (relay, mut rx) = TurnRelay::start("hello");
        relay.progress(ProgressStage::Response, "hi there", None);
        relay.progress(ProgressStage::ToolResult, "42", Some("add"));
        relay.succeed();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], RelayEvent::Ack { query, .. } if query == "hello"));
        assert!(matches!(
            &events[2],
            RelayEvent::Progress { stage: ProgressStage::ToolResult, tool: Some(t), .. } if t == "add"
        ));
        assert!(matches!(events[3], RelayEvent::Success { .. }));
        assert!(events.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[test]
    fn test_drop_emits_aborted() {
        let (relay, mut rx) = TurnRelay::start("q");
        drop(relay);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], RelayEvent::Error { message, .. } if message == ABORTED_MESSAGE));
    }

    #[test]
    fn test_fail_is_single_terminal() {
        let (relay, mut rx) = TurnRelay::start("q");
        relay.fail("boom");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], RelayEvent::Error { message, .. } if message == "boom"));
    }

    #[test]
    fn test_departed_observer_is_ignored() {
        let (relay, rx) = TurnRelay::start("q");
        drop(rx);
        relay.progress(ProgressStage::Response, "nobody listening", None);
        relay.succeed();
    }

    #[test]
    fn test_serialized_kind_tag() {
        let (relay, mut rx) = TurnRelay::start("q");
        relay.progress(ProgressStage::FollowUp, "done", Some("echo"));
        relay.succeed();

        let events = drain(&mut rx);
        let ack = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(ack["kind"], "ack");
        assert_eq!(ack["query"], "q");
        assert!(ack["timestamp"].is_string());

        let progress = serde_json::to_value(&events[1]).unwrap();
        assert_eq!(progress["kind"], "progress");
        assert_eq!(progress["stage"], "follow_up");
        assert_eq!(progress["tool"], "echo");

        let parsed: RelayEvent = serde_json::from_value(progress).unwrap();
        assert_eq!(parsed, events[1]);
        assert_eq!(serde_json::to_value(&events[2]).unwrap()["kind"], "success");
    }
}
