//! Background scheduler for the periodic board tasks.
//!
//! One thread runs three independent periods: the regulation tick, the
//! indicator refresh and the heartbeat. Scheduling is cooperative and
//! best-effort: a late pass runs once and the next deadline is re-based
//! instead of replaying missed passes.
//!
//! Safety: each `Scheduler` owns exactly one thread, stopped and joined when
//! the `Scheduler` is dropped.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use antctl_traits::clock::Clock;

use crate::board::AntennaBoard;
use crate::config::ControlCfg;

/// Which tasks are due in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    pub tick: bool,
    pub indicator: bool,
    pub heartbeat: bool,
}

impl Due {
    pub fn any(&self) -> bool {
        self.tick || self.indicator || self.heartbeat
    }
}

#[derive(Debug, Clone, Copy)]
struct Period {
    every: Duration,
    next: Instant,
}

impl Period {
    fn new(now: Instant, every: Duration) -> Self {
        Self { every, next: now }
    }

    fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.every;
        if self.next <= now {
            self.next = now + self.every;
        }
        true
    }
}

/// Deadline bookkeeping for the three periods; every task is due at start.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    tick: Period,
    indicator: Period,
    heartbeat: Period,
}

impl Schedule {
    pub fn new(now: Instant, cfg: &ControlCfg) -> Self {
        Self {
            tick: Period::new(now, cfg.tick),
            indicator: Period::new(now, cfg.indicator),
            heartbeat: Period::new(now, cfg.heartbeat),
        }
    }

    /// Tasks due at `now`; their deadlines advance.
    pub fn due(&mut self, now: Instant) -> Due {
        Due {
            tick: self.tick.poll(now),
            indicator: self.indicator.poll(now),
            heartbeat: self.heartbeat.poll(now),
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.tick
            .next
            .min(self.indicator.next)
            .min(self.heartbeat.next)
    }
}

/// Counters shared with the scheduler thread.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub ticks: AtomicU64,
    pub tick_failures: AtomicU64,
    pub indicator_refreshes: AtomicU64,
    pub indicator_failures: AtomicU64,
    pub heartbeats: AtomicU64,
}

/// Run the due tasks once. Failures are logged and counted, never propagated,
/// so one failing task cannot starve the others.
pub fn run_due(board: &AntennaBoard, due: Due, stats: &SchedulerStats) {
    if due.tick {
        let failures = board.regulation_tick();
        stats.ticks.fetch_add(1, Ordering::Relaxed);
        stats
            .tick_failures
            .fetch_add(failures.len() as u64, Ordering::Relaxed);
    }
    if due.heartbeat {
        board.heartbeat();
        stats.heartbeats.fetch_add(1, Ordering::Relaxed);
    }
    if due.indicator {
        match board.refresh_indicators() {
            Ok(_) => {
                stats.indicator_refreshes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(error = %e, "indicator refresh failed");
                stats.indicator_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

pub struct Scheduler {
    stop_tx: Option<xch::Sender<()>>,
    stats: Arc<SchedulerStats>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Scheduler {
    pub fn spawn<C: Clock + Send + Sync + 'static>(
        board: Arc<AntennaBoard>,
        cfg: ControlCfg,
        clock: C,
    ) -> Self {
        let (stop_tx, stop_rx) = xch::bounded::<()>(1);
        let stats = Arc::new(SchedulerStats::default());
        let stats_clone = stats.clone();

        let join_handle = std::thread::spawn(move || {
            let mut schedule = Schedule::new(clock.now(), &cfg);
            loop {
                let due = schedule.due(clock.now());
                if due.any() {
                    run_due(&board, due, &stats_clone);
                }
                let wait = schedule
                    .next_deadline()
                    .saturating_duration_since(clock.now());
                // A message or a dropped sender both mean stop.
                match stop_rx.recv_timeout(wait) {
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => {
                        tracing::debug!("scheduler thread received shutdown signal");
                        break;
                    }
                }
            }
            tracing::trace!("scheduler thread exiting cleanly");
        });

        Self {
            stop_tx: Some(stop_tx),
            stats,
            join_handle: Some(join_handle),
        }
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Signal the thread and wait for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("scheduler thread joined successfully"),
                Err(e) => tracing::warn!(?e, "scheduler thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods_fire_independently() {
        let t0 = Instant::now();
        let cfg = ControlCfg::default();
        let mut s = Schedule::new(t0, &cfg);
        assert_eq!(
            s.due(t0),
            Due {
                tick: true,
                indicator: true,
                heartbeat: true
            }
        );
        let d = s.due(t0 + Duration::from_millis(10));
        assert!(d.tick && !d.indicator && !d.heartbeat);
        let d = s.due(t0 + Duration::from_millis(250));
        assert!(d.tick && d.indicator && !d.heartbeat);
    }

    #[test]
    fn late_pass_rebases_instead_of_replaying() {
        let t0 = Instant::now();
        let mut s = Schedule::new(t0, &ControlCfg::default());
        s.due(t0);
        let late = t0 + Duration::from_millis(95);
        assert!(s.due(late).tick);
        assert!(!s.due(late).tick);
        assert_eq!(s.tick.next, late + Duration::from_millis(10));
    }
}
