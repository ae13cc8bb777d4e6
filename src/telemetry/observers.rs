//! Observer broadcast channel
//!
//! Fan-out of [`ObserverMessage`]s to any number of observers over a
//! `tokio::sync::broadcast` channel. Publishing never waits: with no
//! observers the message is simply dropped, and an observer that falls behind
//! skips ahead instead of slowing anyone down. A fresh subscription first
//! yields the welcome notice, then everything published after the join.

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use super::aggregator::MovementSnapshot;
use crate::vehicle::FlightPhase;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topic", content = "payload", rename_all = "lowercase")]
pub enum ObserverMessage {
    /// Periodic full snapshot
    Movement(MovementSnapshot),
    /// Advisory phase notification from the vehicle, forwarded immediately
    Phase(FlightPhase),
    /// Battery level in percent, forwarded immediately
    Battery(u8),
    /// Free-form operator notice
    Notice(String),
}

impl ObserverMessage {
    pub fn topic(&self) -> &'static str {
        match self {
            ObserverMessage::Movement(_) => "movement",
            ObserverMessage::Phase(_) => "phase",
            ObserverMessage::Battery(_) => "battery",
            ObserverMessage::Notice(_) => "notice",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ObserverHub {
    sender: broadcast::Sender<ObserverMessage>,
    welcome: String,
}

impl ObserverHub {
    pub fn new(capacity: usize, welcome: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            welcome: welcome.into(),
        }
    }

    /// Sends to every current observer and returns how many there were.
    pub fn publish(&self, message: ObserverMessage) -> usize {
        match self.sender.send(message) {
            Ok(observers) => observers,
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> ObserverSubscription {
        let receiver = self.sender.subscribe();
        debug!(
            "Observer joined ({} connected)",
            self.sender.receiver_count()
        );
        ObserverSubscription {
            pending_welcome: Some(ObserverMessage::Notice(self.welcome.clone())),
            receiver,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One observer's view of the channel. Dropping it unsubscribes.
pub struct ObserverSubscription {
    pending_welcome: Option<ObserverMessage>,
    receiver: broadcast::Receiver<ObserverMessage>,
}

impl ObserverSubscription {
    /// Next message, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<ObserverMessage> {
        if let Some(welcome) = self.pending_welcome.take() {
            return Some(welcome);
        }
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Observer lagged behind, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next message if one is ready right now.
    pub fn try_recv(&mut self) -> Option<ObserverMessage> {
        if let Some(welcome) = self.pending_welcome.take() {
            return Some(welcome);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Observer lagged behind, skipped {} messages", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
