//! Observers of SRV lookups.

use std::{
    error::Error,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

/// Receives timing and failure events for every lookup performed by a
/// [`ServiceResolver`].
///
/// Reporters are shared between concurrent lookups and must never panic.
///
/// [`ServiceResolver`]: crate::ServiceResolver
pub trait Reporter: Send + Sync {
    /// Called when a lookup starts. The resolver calls [`TimingHandle::stop`]
    /// on the returned handle exactly once, when the lookup completes.
    fn on_lookup_start(&self) -> TimingHandle;

    /// Called when a lookup fails, with the error that caused it.
    fn on_failure(&self, error: &(dyn Error + 'static));

    /// Called when a lookup succeeds but yields no records.
    fn on_empty(&self);
}

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn on_lookup_start(&self) -> TimingHandle {
        (**self).on_lookup_start()
    }

    fn on_failure(&self, error: &(dyn Error + 'static)) {
        (**self).on_failure(error)
    }

    fn on_empty(&self) {
        (**self).on_empty()
    }
}

/// Measures the duration of a single lookup.
pub struct TimingHandle {
    start: Instant,
    sink: Box<dyn FnOnce(Duration) + Send>,
}

impl TimingHandle {
    /// Starts a timer whose elapsed time is handed to `sink` on [`stop`].
    ///
    /// [`stop`]: TimingHandle::stop
    pub fn start(sink: impl FnOnce(Duration) + Send + 'static) -> Self {
        Self {
            start: Instant::now(),
            sink: Box::new(sink),
        }
    }

    /// Starts a timer that records nothing.
    pub fn discard() -> Self {
        Self::start(|_| {})
    }

    /// Stops the timer, records the elapsed time and returns it.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        (self.sink)(elapsed);
        elapsed
    }
}

impl fmt::Debug for TimingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingHandle")
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

/// A [`Reporter`] that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn on_lookup_start(&self) -> TimingHandle {
        TimingHandle::discard()
    }

    fn on_failure(&self, _error: &(dyn Error + 'static)) {}

    fn on_empty(&self) {}
}

/// A [`Reporter`] that logs every event with [`tracing`].
#[cfg(feature = "log")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

#[cfg(feature = "log")]
impl Reporter for TracingReporter {
    fn on_lookup_start(&self) -> TimingHandle {
        TimingHandle::start(|elapsed| {
            tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "SRV lookup finished");
        })
    }

    fn on_failure(&self, error: &(dyn Error + 'static)) {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        tracing::warn!(%error, caused_by = ?chain, "Error when resolving");
    }

    fn on_empty(&self) {
        tracing::info!("Empty response from server");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    };

    #[test]
    fn stop_hands_elapsed_time_to_sink() {
        let recorded = Arc::new(AtomicU64::new(0));
        let sink = recorded.clone();
        let handle = TimingHandle::start(move |elapsed| {
            sink.store(elapsed.as_nanos() as u64 + 1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = handle.stop();
        assert!(elapsed >= Duration::from_millis(5));
        assert_eq!(recorded.load(Ordering::SeqCst), elapsed.as_nanos() as u64 + 1);
    }

    /// Keeps every lookup duration in a histogram it owns.
    #[derive(Default)]
    struct Histogram {
        samples: Arc<Mutex<Vec<Duration>>>,
    }

    impl Reporter for Histogram {
        fn on_lookup_start(&self) -> TimingHandle {
            let samples = self.samples.clone();
            TimingHandle::start(move |elapsed| samples.lock().unwrap().push(elapsed))
        }

        fn on_failure(&self, _error: &(dyn Error + 'static)) {}

        fn on_empty(&self) {}
    }

    #[test]
    fn reporter_owns_its_timings() {
        let reporter = Arc::new(Histogram::default());
        let first = reporter.on_lookup_start().stop();
        let second = reporter.on_lookup_start().stop();
        assert_eq!(*reporter.samples.lock().unwrap(), vec![first, second]);
    }

    #[test]
    fn noop_reporter_accepts_everything() {
        let reporter = NoopReporter;
        let error = std::io::Error::other("boom");
        reporter.on_failure(&error);
        reporter.on_empty();
        reporter.on_lookup_start().stop();
    }

    #[cfg(feature = "log")]
    #[test]
    fn tracing_reporter_walks_source_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("outer")]
        struct Outer(#[source] std::io::Error);

        let reporter = TracingReporter;
        reporter.on_failure(&Outer(std::io::Error::other("inner")));
        reporter.on_empty();
        reporter.on_lookup_start().stop();
    }
}
