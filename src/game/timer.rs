//! Owned timer handles for the per-match loops
//!
//! Every recurring or delayed step is a spawned task that posts a command back into the
//! scheduler's queue. The scheduler keeps one `TimerSlot` per loop; a slot always holds
//! the only handle to its task, so cancelling the slot is the only way to stop it and
//! starting a slot first cancels whatever it held.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

#[derive(Debug, Default)]
pub enum TimerSlot {
    #[default]
    Idle,
    Running(JoinHandle<()>),
}

impl TimerSlot {
    pub fn start(&mut self, handle: JoinHandle<()>) {
        self.cancel();
        *self = TimerSlot::Running(handle);
    }

    /// Abort the task if one is running. Returns whether anything was cancelled.
    pub fn cancel(&mut self) -> bool {
        match self {
            TimerSlot::Running(handle) => {
                handle.abort();
                *self = TimerSlot::Idle;
                true
            }
            TimerSlot::Idle => false,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TimerSlot::Running(handle) if !handle.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let TimerSlot::Running(handle) = self {
            handle.abort();
        }
    }
}

/// Post `make()` into `tx` every `period`, starting immediately
pub fn spawn_repeating<C, F>(period: Duration, tx: mpsc::Sender<C>, mut make: F) -> JoinHandle<()>
where
    C: Send + 'static,
    F: FnMut() -> C + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if tx.send(make()).await.is_err() {
                break;
            }
        }
    })
}

/// Post `make(n)` for n = from-1 down to 0, one `step` apart. The caller announces `from`.
pub fn spawn_countdown<C, F>(from: u32, step: Duration, tx: mpsc::Sender<C>, make: F) -> JoinHandle<()>
where
    C: Send + 'static,
    F: Fn(u32) -> C + Send + 'static,
{
    tokio::spawn(async move {
        for remaining in (0..from).rev() {
            sleep(step).await;
            if tx.send(make(remaining)).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeating_timer_stops_when_cancelled() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut slot = TimerSlot::Idle;
        slot.start(spawn_repeating(Duration::from_millis(50), tx, || 1u8));
        assert!(slot.is_running());

        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(1));
        }

        assert!(slot.cancel());
        assert!(!slot.is_running());
        assert!(!slot.cancel());

        // the task held the only sender, so the channel closes once it is gone
        let mut leftover = 0;
        while rx.recv().await.is_some() {
            leftover += 1;
        }
        assert!(leftover <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_counts_down_to_zero() {
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = spawn_countdown(3, Duration::from_secs(1), tx, |n| n);

        let start = tokio::time::Instant::now();
        let mut seen = Vec::new();
        while let Some(n) = rx.recv().await {
            seen.push(n);
        }
        assert_eq!(seen, vec![2, 1, 0]);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn starting_a_slot_replaces_the_previous_task() {
        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        let mut slot = TimerSlot::default();

        slot.start(spawn_repeating(Duration::from_millis(10), tx_a, || 'a'));
        assert_eq!(rx_a.recv().await, Some('a'));
        slot.start(spawn_repeating(Duration::from_millis(10), tx_b, || 'b'));

        assert_eq!(rx_b.recv().await, Some('b'));
        // the replaced task is gone: its channel drains and closes
        while rx_a.recv().await.is_some() {}
        drop(slot);
        while rx_b.recv().await.is_some() {}
    }
}
