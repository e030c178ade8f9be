use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::extractor::extract_opportunity;
use super::trends::KeywordCounter;
use crate::core::shutdown::Shutdown;

const CHAT_SOURCE: &str = "chat";

/// Count the agent type mentioned in a message, if any
pub fn record_message(counter: &KeywordCounter, text: &str) -> Option<String> {
    let opp = extract_opportunity(text, CHAT_SOURCE)?;
    let count = counter.increment(&opp.agent_type);
    debug!("Chat mention of '{}' ({} this window)", opp.agent_type, count);
    Some(opp.agent_type)
}

/// Push-based listener that feeds live chat messages into the trend counter
pub struct ChatListener {
    rx: mpsc::Receiver<String>,
    counter: Arc<KeywordCounter>,
}

impl ChatListener {
    pub fn new(rx: mpsc::Receiver<String>, counter: Arc<KeywordCounter>) -> Self {
        Self { rx, counter }
    }

    /// Consume messages until every sender is dropped or shutdown fires.
    /// Returns the number of messages seen.
    pub async fn run(mut self, shutdown: Shutdown) -> u64 {
        info!("Chat listener started");
        let mut seen = 0;

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(text) => {
                        seen += 1;
                        record_message(&self.counter, &text);
                    }
                    None => break,
                },
                _ = shutdown.wait() => break,
            }
        }

        info!("Chat listener stopped after {} messages", seen);
        seen
    }

    /// Run the listener on its own task
    pub fn spawn(self, shutdown: Shutdown) -> tokio::task::JoinHandle<u64> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listener_counts_until_channel_closes() {
        let counter = Arc::new(KeywordCounter::new());
        let (tx, rx) = mpsc::channel(8);
        let handle = ChatListener::new(rx, Arc::clone(&counter)).spawn(Shutdown::new());

        for text in ["need a meme agent", "gm", "meme agent pls"] {
            tx.send(text.to_string()).await.unwrap();
        }
        drop(tx);

        assert_eq!(handle.await.unwrap(), 3);
        assert_eq!(counter.get("meme"), 2);
    }

    #[tokio::test]
    async fn test_listener_stops_on_shutdown() {
        let counter = Arc::new(KeywordCounter::new());
        let (_tx, rx) = mpsc::channel::<String>(8);
        let shutdown = Shutdown::new();
        let handle = ChatListener::new(rx, counter).spawn(shutdown.clone());

        shutdown.trigger();
        assert_eq!(handle.await.unwrap(), 0);
    }
}
