//! In-process broker carrying location reports from publishers to the
//! consumer task.
//!
//! Messages travel through a single FIFO queue, so ordering per trip key is
//! preserved. A networked broker can replace it by implementing
//! [`realtime::Broker`].

use anyhow::{Context, Result};
use realtime::{Broker, Message};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::Messaging;

/// Messages queued between publishers and the consumer before publishers
/// wait.
pub const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct LocalBroker {
    tx: Sender<Message>,
}

impl Broker for LocalBroker {
    async fn send(&self, message: &Message) -> Result<()> {
        self.tx.send(message.clone()).await.context("location queue closed")
    }
}

/// Receiving side of a [`LocalBroker`].
#[derive(Debug)]
pub struct Consumer {
    rx: Receiver<Message>,
}

/// Create a connected broker and consumer pair.
#[must_use]
pub fn local_broker(capacity: usize) -> (LocalBroker, Consumer) {
    let (tx, rx) = mpsc::channel(capacity);
    (LocalBroker { tx }, Consumer { rx })
}

impl Consumer {
    /// Hand each queued message to `messaging` until `stop` fires, then
    /// deliver whatever is still queued and return.
    pub async fn run(mut self, messaging: Messaging, mut stop: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    let Some(message) = message else { break };
                    handle(&messaging, &message);
                }
                _ = &mut stop => {
                    self.rx.close();
                    while let Some(message) = self.rx.recv().await {
                        handle(&messaging, &message);
                    }
                    break;
                }
            }
        }
        info!("location consumer stopped");
    }
}

fn handle(messaging: &Messaging, message: &Message) {
    if let Err(e) = messaging.handle(message) {
        error!(
            monotonic_counter.processing_errors = 1,
            error = %e,
            topic = %message.topic,
            key = message.key().unwrap_or_default()
        );
    }
}
