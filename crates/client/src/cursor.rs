//! Fixed-rate marker interpolation loop.
use std::time::Duration;

use client_core::{MarkerPosition, MarkerProjector, MarkerTarget};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Drives a [`MarkerProjector`] once per display frame, regardless of how
/// often targets arrive.
pub struct MarkerLoop {
    target_tx: watch::Sender<Option<MarkerTarget>>,
    position_rx: watch::Receiver<MarkerPosition>,
    task: Option<JoinHandle<()>>,
}

impl MarkerLoop {
    pub fn spawn(period: Duration) -> Self {
        Self::resume(period, MarkerPosition::default(), None)
    }

    /// Start from `position`, still heading for `target`.
    pub fn resume(
        period: Duration,
        position: MarkerPosition,
        target: Option<MarkerTarget>,
    ) -> Self {
        let (target_tx, mut target_rx) = watch::channel(target);
        let (position_tx, position_rx) = watch::channel(position);

        let task = tokio::spawn(async move {
            let mut projector = MarkerProjector::resume(position, target);
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Some(target) = *target_rx.borrow_and_update() {
                    projector.set_target(target);
                }
                let next = projector.tick();
                position_tx.send_if_modified(|position| {
                    let moved = *position != next;
                    *position = next;
                    moved
                });
            }
        });

        Self {
            target_tx,
            position_rx,
            task: Some(task),
        }
    }

    pub fn set_target(&self, target: MarkerTarget) {
        self.target_tx.send_replace(Some(target));
    }

    pub fn target(&self) -> Option<MarkerTarget> {
        *self.target_tx.borrow()
    }

    pub fn position(&self) -> MarkerPosition {
        *self.position_rx.borrow()
    }

    /// Stop the loop. Returns `false` if it was not running.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for MarkerLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}
