pub mod kafka;
pub mod retry;

use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

use crate::enrich::EnrichedEvent;
use crate::error::PublishError;

/// Acknowledgment that the stream durably appended the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub partition: i32,
    pub offset: i64,
}

/// Write side of the event stream. The partition key routes all events for
/// one user to one ordered partition; no ordering exists across keys.
/// At-least-once: a retried attempt after an ambiguous failure may duplicate.
#[async_trait]
pub trait StreamPublisher: Send + Sync {
    async fn publish(&self, key: &str, event: &EnrichedEvent) -> Result<Ack, PublishError>;
}

/// Lifecycle of the process-wide stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Closed,
}

/// Lock-free state cell. Written by the startup sequencer (to Ready) and the
/// shutdown path (to Closed); request handlers only read it.
#[derive(Debug)]
pub struct ConnectionStateCell(AtomicU8);

impl ConnectionStateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    pub fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::Acquire) {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Ready,
            _ => ConnectionState::Closed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.get() == ConnectionState::Ready
    }
}

impl Default for ConnectionStateCell {
    fn default() -> Self {
        Self::new()
    }
}
