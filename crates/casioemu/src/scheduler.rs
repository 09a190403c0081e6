//! Real-time cadence for the display decay.
//!
//! The glass keeps fading whether or not the processor runs, so the decay tick
//! lives on its own thread and never waits for the bus. Displays hand the
//! ticker a shared [`DecayModel`]; the ticker calls it at a fixed interval with
//! the time elapsed since it started.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Display state advanced by the decay cadence
pub trait DecayModel: Send + Sync + 'static {
    /// Advance one tick; `t_ms` drives the scan-line model
    fn step(&self, t_ms: f32);
}

/// Milliseconds elapsed on a monotonic clock
#[derive(Debug, Clone, Copy)]
pub struct DecayClock {
    start: Instant,
}

impl DecayClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> f32 {
        self.start.elapsed().as_secs_f32() * 1000.0
    }
}

/// Background thread stepping a [`DecayModel`].
///
/// Stopped and joined by [`DecayTicker::stop`] or on drop.
pub struct DecayTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DecayTicker {
    pub fn spawn(
        name: &str,
        model: Arc<dyn DecayModel>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name(format!("{name}-decay"))
            .spawn(move || {
                let clock = DecayClock::start();
                let mut next = Instant::now();
                while !thread_stop.load(Ordering::Acquire) {
                    model.step(clock.now_ms());
                    next += interval;
                    let now = Instant::now();
                    if next > now {
                        std::thread::sleep(next - now);
                    } else {
                        // Fell behind; drop the backlog instead of bursting
                        next = now;
                    }
                }
            })?;
        debug!("Started {} decay ticker every {:?}", name, interval);
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Ask the thread to exit and wait for it
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("Decay ticker thread panicked");
        }
    }
}

impl Drop for DecayTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter {
        steps: AtomicUsize,
    }

    impl DecayModel for Counter {
        fn step(&self, _t_ms: f32) {
            self.steps.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_ticker_runs_until_stopped() {
        let counter = Arc::new(Counter::default());
        let mut ticker =
            DecayTicker::spawn("test", counter.clone(), Duration::from_micros(50)).unwrap();
        while counter.steps.load(Ordering::Relaxed) < 10 {
            std::thread::yield_now();
        }
        ticker.stop();
        assert!(!ticker.is_running());

        let after_stop = counter.steps.load(Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(counter.steps.load(Ordering::Relaxed), after_stop);
    }

    #[test]
    fn test_drop_joins_thread() {
        let counter = Arc::new(Counter::default());
        {
            let _ticker =
                DecayTicker::spawn("test", counter.clone(), Duration::from_millis(1)).unwrap();
        }
        // The thread held the only other reference
        assert_eq!(Arc::strong_count(&counter), 1);
    }
}
