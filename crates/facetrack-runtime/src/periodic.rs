//! Shared tick/shutdown plumbing for the periodic tasks.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Receiving side of the controller's shutdown signal.  The task should stop
/// as soon as the value becomes `true` or the sender is dropped.
pub type Shutdown = watch::Receiver<bool>;

/// An interval whose first tick is one full `period` from now.  Late ticks
/// are skipped rather than bursted.
pub(crate) fn ticker(period: Duration) -> Interval {
    let mut t = interval_at(Instant::now() + period, period);
    t.set_missed_tick_behavior(MissedTickBehavior::Skip);
    t
}

/// Wait for the next tick.  Returns `false` once shutdown is requested.
pub(crate) async fn next_tick(ticker: &mut Interval, shutdown: &mut Shutdown) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        biased;
        _ = shutdown.changed() => false,
        _ = ticker.tick() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_one_period_out() {
        let (_tx, mut rx) = watch::channel(false);
        let start = Instant::now();
        let mut t = ticker(Duration::from_secs(60));
        assert!(next_tick(&mut t, &mut rx).await);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_the_wait() {
        let (tx, mut rx) = watch::channel(false);
        let mut t = ticker(Duration::from_secs(60));
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = tx.send(true);
        });
        let start = Instant::now();
        assert!(!next_tick(&mut t, &mut rx).await);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn dropped_sender_stops_the_task() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let mut t = ticker(Duration::from_secs(60));
        assert!(!next_tick(&mut t, &mut rx).await);
    }
}
