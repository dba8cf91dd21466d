//! Single-slot rendezvous mailboxes
//!
//! Per-client round channels are one value per round with one writer and
//! one reader. A capacity-one mpsc channel behind an async receive lock
//! gives exactly that: `put` parks once the slot is full, `take` drains
//! exactly one value.

use tokio::sync::{mpsc, Mutex};

use crate::error::{Result, ServerError};

pub struct Mailbox<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Deliver one value, waiting while the slot is occupied.
    pub async fn put(&self, value: T) -> Result<()> {
        self.tx
            .send(value)
            .await
            .map_err(|_| ServerError::ChannelClosed("mailbox receiver dropped"))
    }

    /// Receive exactly one value, waiting until one is delivered.
    pub async fn take(&self) -> Result<T> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .ok_or(ServerError::ChannelClosed("mailbox sender dropped"))
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
