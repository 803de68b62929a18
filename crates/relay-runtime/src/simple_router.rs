//! A minimal [`Router`] implementation.
//!
//! Message matching and dispatch are out of scope; this only tracks which
//! matcher each filter/output is currently registered under, serialized
//! through a bounded command channel the way [`Router`]'s doc comment
//! describes a real implementation doing it.

use async_trait::async_trait;
use relay_core::{MatcherSpec, PipelineError, PipelineResult, Router};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

enum Command {
    Add(String, MatcherSpec, oneshot::Sender<()>),
    Remove(String, oneshot::Sender<()>),
}

pub struct SimpleRouter {
    tx: mpsc::Sender<Command>,
}

impl SimpleRouter {
    /// Spawns the router's serializing task with a command queue of the
    /// given capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(async move {
            let mut matchers: HashMap<String, MatcherSpec> = HashMap::new();
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Add(name, matcher, ack) => {
                        matchers.insert(name, matcher);
                        let _ = ack.send(());
                    }
                    Command::Remove(name, ack) => {
                        matchers.remove(&name);
                        let _ = ack.send(());
                    }
                }
            }
        });
        Self { tx }
    }
}

#[async_trait]
impl Router for SimpleRouter {
    async fn add_matcher(&self, name: &str, matcher: MatcherSpec) -> PipelineResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Add(name.to_string(), matcher, ack_tx))
            .await
            .map_err(|_| PipelineError::Aborted)?;
        ack_rx.await.map_err(|_| PipelineError::Aborted)
    }

    async fn remove_matcher(&self, name: &str) -> PipelineResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Remove(name.to_string(), ack_tx))
            .await
            .map_err(|_| PipelineError::Aborted)?;
        ack_rx.await.map_err(|_| PipelineError::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_remove_round_trips() {
        let router = SimpleRouter::new(4);
        let matcher = MatcherSpec {
            message_matcher: "Type == 'test'".to_string(),
            message_signer: None,
        };
        router.add_matcher("MyFilter", matcher).await.unwrap();
        router.remove_matcher("MyFilter").await.unwrap();
    }
}
