use std::sync::Arc;

use tokio::sync::watch;

/// Process-wide pause switch.
///
/// Written by the console, read by the pipeline. Readers can await a change
/// instead of polling.
#[derive(Clone, Debug)]
pub struct PauseFlag {
    sender: Arc<watch::Sender<bool>>,
}

impl PauseFlag {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn pause(&self) {
        self.sender.send_replace(true);
    }

    pub fn resume(&self) {
        self.sender.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once the flag is set
    pub async fn paused(&self) {
        self.wait_for(true).await;
    }

    /// Resolve once the flag is cleared
    pub async fn resumed(&self) {
        self.wait_for(false).await;
    }

    async fn wait_for(&self, state: bool) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail
        let _ = receiver.wait_for(|paused| *paused == state).await;
    }
}

impl Default for PauseFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resumed_waits_for_clear() {
        let flag = PauseFlag::new();
        flag.pause();
        assert!(flag.is_paused());

        let waiter = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.resumed().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        flag.resume();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_resolves_immediately_when_already_in_state() {
        let flag = PauseFlag::new();
        tokio::time::timeout(Duration::from_millis(100), flag.resumed())
            .await
            .unwrap();
    }
}
