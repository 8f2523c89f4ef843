// Activity Context - identity, heartbeats and cancellation of one attempt

use crate::domain::WorkflowId;
use crate::port::CancelToken;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Last heartbeat recorded by an attempt
#[derive(Debug, Clone)]
pub struct HeartbeatRecord {
    pub at: Instant,
    pub details: String,
    pub count: u64,
}

/// Handed to an activity for the duration of one attempt
pub struct ActivityContext {
    workflow_id: WorkflowId,
    attempt: u32,
    heartbeat_tx: watch::Sender<HeartbeatRecord>,
    cancel: CancelToken,
}

impl ActivityContext {
    /// Context plus the monitor the engine uses to detect a stalled attempt
    pub fn new(workflow_id: WorkflowId, attempt: u32, cancel: CancelToken) -> (Self, HeartbeatMonitor) {
        let (heartbeat_tx, heartbeat_rx) = watch::channel(HeartbeatRecord {
            at: Instant::now(),
            details: String::new(),
            count: 0,
        });
        (
            Self {
                workflow_id,
                attempt,
                heartbeat_tx,
                cancel,
            },
            HeartbeatMonitor { rx: heartbeat_rx },
        )
    }

    /// Context nobody watches or cancels (direct calls, tests)
    pub fn detached(workflow_id: WorkflowId) -> Self {
        Self::new(workflow_id, 1, CancelToken::never()).0
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn record_heartbeat(&self, details: &str) {
        self.heartbeat_tx.send_modify(|hb| {
            hb.at = Instant::now();
            hb.details = details.to_string();
            hb.count += 1;
        });
    }
}

/// Engine-side view of an attempt's heartbeats
pub struct HeartbeatMonitor {
    rx: watch::Receiver<HeartbeatRecord>,
}

impl HeartbeatMonitor {
    pub fn last(&self) -> HeartbeatRecord {
        self.rx.borrow().clone()
    }

    /// Resolves once no heartbeat arrived for `timeout`
    pub async fn stalled(&mut self, timeout: Duration) {
        loop {
            let deadline = self.rx.borrow_and_update().at + timeout;
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    if self.rx.borrow().at + timeout <= Instant::now() {
                        return;
                    }
                }
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        // Context dropped: the attempt is over
                        std::future::pending::<()>().await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heartbeat_is_recorded() {
        let (ctx, monitor) = ActivityContext::new(WorkflowId::new("wf"), 1, CancelToken::never());
        ctx.record_heartbeat("Running sync command");
        ctx.record_heartbeat("Running sync command");

        let last = monitor.last();
        assert_eq!(last.count, 2);
        assert_eq!(last.details, "Running sync command");
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_detects_stall() {
        let (_ctx, mut monitor) = ActivityContext::new(WorkflowId::new("wf"), 1, CancelToken::never());

        let started = Instant::now();
        monitor.stalled(Duration::from_secs(60)).await;
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_keep_attempt_alive() {
        let (ctx, mut monitor) = ActivityContext::new(WorkflowId::new("wf"), 1, CancelToken::never());

        let beat = tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_secs(10)).await;
                ctx.record_heartbeat("tick");
            }
            ctx
        });

        let started = Instant::now();
        monitor.stalled(Duration::from_secs(30)).await;
        // Last beat at 50s, stall detected 30s later
        assert!(started.elapsed() >= Duration::from_secs(80));
        drop(beat);
    }

    #[test]
    fn test_detached_context() {
        let ctx = ActivityContext::detached(WorkflowId::new("wf"));
        assert_eq!(ctx.attempt(), 1);
        assert!(!ctx.is_cancelled());
        ctx.record_heartbeat("ok");
    }
}
