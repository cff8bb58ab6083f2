//! I/O time instrumentation.
//!
//! The sorter never measures anything on its own: a caller that wants to know how much
//! time went into disk I/O passes an [`IoClock`] and every stream the sorter opens is
//! wrapped with [`Timed`]. Without a clock the wrapper is a plain pass-through.

use std::io;
use std::io::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Accumulates time spent inside stream reads, writes and flushes.
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct IoClock {
    nanos: Arc<AtomicU64>,
}

impl IoClock {
    pub fn new() -> Self {
        IoClock::default()
    }

    /// Runs `f` and adds its duration to the clock.
    pub fn measure<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
        self.nanos.fetch_add(elapsed, Ordering::Relaxed);

        return result;
    }

    /// Total measured time.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

/// Byte stream wrapper reporting I/O time to an optional [`IoClock`].
#[derive(Debug)]
pub struct Timed<S> {
    inner: S,
    clock: Option<IoClock>,
}

impl<S> Timed<S> {
    pub fn new(inner: S, clock: Option<IoClock>) -> Self {
        Timed { inner, clock }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn measure<T>(&mut self, f: impl FnOnce(&mut S) -> T) -> T {
        match &self.clock {
            Some(clock) => {
                let inner = &mut self.inner;
                clock.measure(|| f(inner))
            }
            None => f(&mut self.inner),
        }
    }
}

impl<S: Read> Read for Timed<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.measure(|inner| inner.read(buf))
    }
}

impl<S: Write> Write for Timed<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.measure(|inner| inner.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.measure(|inner| inner.flush())
    }
}

#[cfg(test)]
mod test {
    use std::io::prelude::*;
    use std::thread;
    use std::time::Duration;

    use super::{IoClock, Timed};

    #[test]
    fn test_clock_accumulates() {
        let clock = IoClock::new();
        let shared = clock.clone();

        let value = shared.measure(|| {
            thread::sleep(Duration::from_millis(5));
            42
        });

        assert_eq!(value, 42);
        assert!(clock.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_timed_passthrough() {
        let clock = IoClock::new();
        let mut timed = Timed::new(Vec::new(), Some(clock));
        timed.write_all(b"abc").unwrap();
        timed.flush().unwrap();
        assert_eq!(timed.into_inner(), b"abc");

        let mut untimed = Timed::new(&b"xyz"[..], None);
        let mut buf = String::new();
        untimed.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "xyz");
    }
}
