//! Periodic re-render signal for countdown displays.
//!
//! The ticker only bumps an opaque counter. Consumers subscribe and re-query whatever they
//! display (e.g. [`AccountSecurity::is_account_locked`](crate::AccountSecurity::is_account_locked))
//! when it changes.

use std::time::Duration;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};

pub struct CountdownTicker {
    sender: watch::Sender<u64>,
    handle: Option<JoinHandle<()>>,
}

impl CountdownTicker {
    /// Start ticking every `period`. Must be called within a tokio runtime.
    pub fn start(period: Duration) -> Self {
        let (sender, _) = watch::channel(0u64);
        let tx = sender.clone();

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tx.send_modify(|tick| *tick = tick.wrapping_add(1));
            }
        });

        tracing::debug!(period_ms = period.as_millis() as u64, "Countdown ticker started");
        Self {
            sender,
            handle: Some(handle),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }

    /// Ticks published so far.
    pub fn current(&self) -> u64 {
        *self.sender.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Countdown ticker stopped");
        }
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CountdownTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownTicker")
            .field("ticks", &self.current())
            .field("running", &self.is_running())
            .finish()
    }
}
