use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Keyword frequency counter shared between the chat listener and the aggregator.
///
/// Reads swap the whole map out under the lock, so no increment that lands
/// between a read and a clear can be lost.
#[derive(Debug, Default)]
pub struct KeywordCounter {
    counts: Mutex<HashMap<String, u64>>,
}

impl KeywordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one mention of an agent type, returning the running total
    pub fn increment(&self, agent_type: &str) -> u64 {
        let mut counts = self.lock();
        let count = counts.entry(agent_type.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Atomically take every count and leave the counter empty
    pub fn take(&self) -> HashMap<String, u64> {
        std::mem::take(&mut *self.lock())
    }

    pub fn get(&self, agent_type: &str) -> u64 {
        self.lock().get(agent_type).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        match self.counts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_take_clears() {
        let counter = KeywordCounter::new();
        counter.increment("meme");
        counter.increment("meme");

        let counts = counter.take();
        assert_eq!(counts.get("meme"), Some(&2));
        assert!(counter.is_empty());
        assert!(counter.take().is_empty());
    }

    #[test]
    fn test_concurrent_increments_are_never_lost() {
        let counter = Arc::new(KeywordCounter::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..250 {
                    counter.increment("meme");
                }
            }));
        }

        let mut seen = 0;
        while handles.iter().any(|h| !h.is_finished()) {
            seen += counter.take().get("meme").copied().unwrap_or(0);
        }
        for handle in handles {
            handle.join().unwrap();
        }
        seen += counter.take().get("meme").copied().unwrap_or(0);

        assert_eq!(seen, 1000);
    }
}
