//! Heartbeat keep-alive loop
//!
//! While the connection is live, asks the manager to send a ping frame at
//! a fixed interval and tracks the most recent pong. If no pong arrives
//! within twice the interval, emits a single stale signal and stops. The
//! decision to reconnect belongs to the manager, not to this loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Requests and signals emitted by the heartbeat loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatEvent {
    /// Time to send a ping frame
    SendPing,
    /// No pong within the liveness window; connection is stale
    Stale,
}

/// How the heartbeat loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatOutcome {
    /// Stale signal was emitted
    Stale,
    /// Stopped externally (pong channel or event channel dropped)
    Stopped,
}

/// Running heartbeat attached to one connected session
pub(crate) struct HeartbeatHandle {
    pong_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Sender half for pong-equivalents; installed as the router's pong sink
    pub fn pong_sender(&self) -> mpsc::UnboundedSender<()> {
        self.pong_tx.clone()
    }

    /// Stop the loop and clear its timer
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Start a heartbeat for the current session
pub(crate) fn spawn_heartbeat(
    interval: Duration,
    events: mpsc::UnboundedSender<HeartbeatEvent>,
) -> HeartbeatHandle {
    let (pong_tx, pong_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let outcome = run_heartbeat(interval, pong_rx, events).await;
        tracing::debug!(?outcome, "Heartbeat loop ended");
    });
    HeartbeatHandle { pong_tx, task }
}

/// Drive the ping/stale loop until it ends
async fn run_heartbeat(
    interval: Duration,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    events: mpsc::UnboundedSender<HeartbeatEvent>,
) -> HeartbeatOutcome {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    // The first tick of a fresh interval resolves immediately; the session
    // just authenticated, so swallow it rather than pinging at once.
    ticker.tick().await;

    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if last_pong.elapsed() > interval * 2 {
                    let _ = events.send(HeartbeatEvent::Stale);
                    return HeartbeatOutcome::Stale;
                }
                if events.send(HeartbeatEvent::SendPing).is_err() {
                    return HeartbeatOutcome::Stopped;
                }
            }
            pong = pong_rx.recv() => match pong {
                Some(()) => last_pong = Instant::now(),
                None => return HeartbeatOutcome::Stopped,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ping_requested_each_interval() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_heartbeat(
            Duration::from_millis(100),
            pong_rx,
            events_tx,
        ));

        for _ in 0..2 {
            let ev = events_rx.recv().await.unwrap();
            assert_eq!(ev, HeartbeatEvent::SendPing);
            // Keep the connection fresh
            pong_tx.send(()).unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_without_pongs() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_pong_tx, pong_rx) = mpsc::unbounded_channel();

        let loop_task = tokio::spawn(run_heartbeat(
            Duration::from_millis(100),
            pong_rx,
            events_tx,
        ));

        // Pings keep flowing until the liveness window is exceeded
        let mut pings = 0;
        loop {
            match events_rx.recv().await.unwrap() {
                HeartbeatEvent::SendPing => pings += 1,
                HeartbeatEvent::Stale => break,
            }
        }
        assert!(pings >= 2);
        assert_eq!(loop_task.await.unwrap(), HeartbeatOutcome::Stale);

        // Exactly one stale signal, then the loop is gone
        assert!(events_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pongs_keep_connection_alive() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_heartbeat(
            Duration::from_millis(100),
            pong_rx,
            events_tx,
        ));

        // Answer every ping; no stale should ever arrive
        for _ in 0..10 {
            let ev = events_rx.recv().await.unwrap();
            assert_eq!(ev, HeartbeatEvent::SendPing);
            pong_tx.send(()).unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_pong_channel_dropped() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();

        let loop_task = tokio::spawn(run_heartbeat(
            Duration::from_millis(100),
            pong_rx,
            events_tx,
        ));

        drop(pong_tx);
        assert_eq!(loop_task.await.unwrap(), HeartbeatOutcome::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_stop_aborts_loop() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = spawn_heartbeat(Duration::from_millis(100), events_tx);

        // Let one ping through, then stop
        assert_eq!(events_rx.recv().await.unwrap(), HeartbeatEvent::SendPing);
        handle.stop();

        assert!(events_rx.recv().await.is_none());
    }
}
