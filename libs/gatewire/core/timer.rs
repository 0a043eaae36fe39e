//! Scoped timers feeding the client's actor channel
//!
//! ```text
//! ┌──────────────────┐
//! │  Timer task      │
//! │  (tokio spawn)   │
//! │                  │
//! │  tick / deadline ┼──> mpsc ──> actor loop ──> GatewayCore
//! └──────────────────┘
//!          ▲
//!          └── aborted when its TimerHandle is dropped
//! ```
//!
//! Timers never touch session state themselves; they only post a message.
//! Dropping (or replacing) the handle cancels the task, so a torn-down
//! connection can never be hit by a late tick.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

/// Owning handle of a timer task; aborts the task on drop
#[derive(Debug)]
pub struct TimerHandle {
    handle: JoinHandle<()>,
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Post `make()` every `interval`, first one full interval from now
///
/// Missed ticks are skipped rather than burst.
pub fn spawn_ticker<T, F>(interval: Duration, tx: UnboundedSender<T>, make: F) -> TimerHandle
where
    T: Send + 'static,
    F: Fn() -> T + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        debug!("Ticker started with interval: {:?}", interval);

        loop {
            ticker.tick().await;
            if tx.send(make()).is_err() {
                debug!("Actor channel closed, ticker exiting");
                break;
            }
        }
    });

    TimerHandle { handle }
}

/// Post `message` once after `delay`
pub fn spawn_delay<T>(delay: Duration, tx: UnboundedSender<T>, message: T) -> TimerHandle
where
    T: Send + 'static,
{
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(message);
    });

    TimerHandle { handle }
}
