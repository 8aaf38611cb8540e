//! Background ticker that paces cosmetic refreshes. It only ever reads the
//! advisory [`RunStatus`], the machine itself stays with the debugger.

use crate::util;
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// Published by the debugger, read by the governor. Never used for control decisions.
#[derive(Debug, Default)]
pub struct RunStatus {
    running: AtomicBool,
    run_time_ms: AtomicU64,
}

impl RunStatus {
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn set_run_time(&self, run_time: Duration) {
        let millis = u64::try_from(run_time.as_millis()).unwrap_or(u64::MAX);
        self.run_time_ms.store(millis, Ordering::Relaxed);
    }

    pub fn run_time(&self) -> Duration {
        Duration::from_millis(self.run_time_ms.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Wall time since the governor started
    pub elapsed: Duration,
    pub running: bool,
    pub run_time: Duration,
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KRIS | {} | RUN {} | UP {}",
            if self.running { "RUNNING" } else { "IDLE" },
            util::format_minutes(self.run_time),
            util::format_minutes(self.elapsed)
        )
    }
}

pub struct Governor {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Governor {
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

    /// Start ticking every `period`, handing each tick to `sink` on the governor's thread.
    pub fn spawn(
        status: Arc<RunStatus>,
        period: Duration,
        mut sink: impl FnMut(Tick) + Send + 'static,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            let span = tracing::span!(tracing::Level::INFO, "clock");
            let _enter = span.enter();
            let started = Instant::now();

            while !thread_stop.load(Ordering::Relaxed) {
                sink(Tick {
                    elapsed: started.elapsed(),
                    running: status.is_running(),
                    run_time: status.run_time(),
                });
                std::thread::park_timeout(period);
            }
            tracing::debug!("clock governor stopped");
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::error!("clock thread panicked");
            }
        }
    }
}

impl Drop for Governor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn ticks_until_stopped() {
        let status = Arc::new(RunStatus::default());
        status.set_running(true);
        status.set_run_time(Duration::from_secs(3));

        let (sender, receiver) = channel();
        let mut governor = Governor::spawn(Arc::clone(&status), Duration::from_millis(1), move |tick| {
            let _ = sender.send(tick);
        });

        let tick = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(tick.running);
        assert_eq!(tick.run_time, Duration::from_secs(3));

        governor.stop();
        // The sink went away with the thread
        while receiver.try_recv().is_ok() {}
        assert!(receiver.recv().is_err());
    }

    #[test]
    fn tick_line() {
        let tick = Tick {
            elapsed: Duration::from_secs(125),
            running: false,
            run_time: Duration::from_secs(7),
        };
        assert_eq!(tick.to_string(), "KRIS | IDLE | RUN 00:07 | UP 02:05");

        let tick = Tick { running: true, ..tick };
        assert!(tick.to_string().starts_with("KRIS | RUNNING |"));
    }

    #[test]
    fn stop_does_not_wait_for_period() {
        let status = Arc::new(RunStatus::default());
        let mut governor = Governor::spawn(status, Duration::from_secs(3600), |_| {});
        let started = Instant::now();
        governor.stop();
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
