//! Message consumer
//!
//! Single worker that drains a channel of raw JSON messages and hands each
//! decoded message to a [`MessageHandler`]. Each message is its own failure
//! boundary: a payload that does not decode, a handler error and a handler
//! panic are all logged, and the loop moves on to the next message.

use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::CatalogResult;

#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    type Message: DeserializeOwned + Send + 'static;

    /// Name used in log lines.
    fn name(&self) -> &'static str;

    async fn handle(&self, message: Self::Message) -> CatalogResult<()>;
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Handled,
    Malformed(String),
    Failed(String),
    Panicked(String),
}

pub struct MessageConsumer<H: MessageHandler> {
    handler: Arc<H>,
}

impl<H: MessageHandler> MessageConsumer<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Consume until the channel closes or shutdown is signalled.
    /// Returns the number of messages received.
    pub async fn run(
        &self,
        mut messages: mpsc::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> usize {
        let name = self.handler.name();
        info!(consumer = name, "Message consumer started");
        let mut received = 0usize;

        loop {
            if *shutdown.borrow() {
                info!(consumer = name, "Message consumer shutting down");
                break;
            }

            tokio::select! {
                next = messages.recv() => {
                    let Some(raw) = next else {
                        info!(consumer = name, "Message channel closed");
                        break;
                    };
                    received += 1;
                    self.process(&raw).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(consumer = name, "Message consumer shutting down (while idle)");
                        break;
                    }
                }
            }
        }

        info!(consumer = name, received, "Message consumer stopped");
        received
    }

    /// Decode and handle a single raw message.
    pub async fn process(&self, raw: &str) -> Delivery {
        let name = self.handler.name();

        let message: H::Message = match serde_json::from_str(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(consumer = name, error = %e, payload = raw, "Dropping malformed message");
                return Delivery::Malformed(e.to_string());
            }
        };

        match AssertUnwindSafe(self.handler.handle(message))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {
                debug!(consumer = name, "Message handled");
                Delivery::Handled
            }
            Ok(Err(e)) => {
                error!(consumer = name, error = %e, kind = ?e.kind(), "Message handling failed");
                Delivery::Failed(e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(consumer = name, panic = %reason, "Message handler panicked");
                Delivery::Panicked(reason)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
