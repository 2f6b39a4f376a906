use std::io::{self, Write};
use std::time::Instant;

/// Optional progress capability passed alongside long-running operations.
///
/// Callers that want feedback hand an implementation in as
/// `Option<&mut dyn ProgressSink>`; the engine itself never constructs
/// one. This replaces runtime capability queries with an explicit
/// parameter at the call site.
pub trait ProgressSink {
    /// Report that `current` of an optional `total` units are done.
    fn update(&mut self, current: u64, total: Option<u64>);

    /// Report completion. Default is a no-op.
    fn finish(&mut self) {}
}

/// Progress display on stderr with rate-limited updates.
///
/// Renders lines like `scanning changelog:  50% (42/84)` or, without a
/// known total, `scanning changelog: 42`.
pub struct StderrProgress {
    title: String,
    current: u64,
    start_time: Instant,
    last_update: Instant,
    /// Minimum delay between display updates in milliseconds.
    delay_ms: u64,
    started: bool,
    /// Last percentage displayed (to avoid redundant updates).
    last_percent: Option<u32>,
}

impl StderrProgress {
    pub fn new(title: &str) -> Self {
        let now = Instant::now();
        Self {
            title: title.to_string(),
            current: 0,
            start_time: now,
            last_update: now,
            delay_ms: 100,
            started: false,
            last_percent: None,
        }
    }

    fn display(&self, total: Option<u64>) {
        let mut stderr = io::stderr();
        let line = match total {
            Some(total) if total > 0 => {
                let percent = (self.current as f64 / total as f64) * 100.0;
                format!("\r{}: {:3.0}% ({}/{})", self.title, percent, self.current, total)
            }
            _ => format!("\r{}: {}", self.title, self.current),
        };
        let _ = write!(stderr, "{}", line);
        let _ = stderr.flush();
    }
}

impl ProgressSink for StderrProgress {
    fn update(&mut self, current: u64, total: Option<u64>) {
        self.current = current;

        let now = Instant::now();
        let since_last = now.duration_since(self.last_update).as_millis() as u64;
        let at_end = total.is_some_and(|t| current >= t);

        // Rate-limit updates, but always show completion.
        if self.started && since_last < self.delay_ms && !at_end {
            return;
        }
        if let Some(total) = total {
            if total > 0 {
                let percent = ((current as f64 / total as f64) * 100.0) as u32;
                if self.started && self.last_percent == Some(percent) && !at_end {
                    return;
                }
                self.last_percent = Some(percent);
            }
        }

        self.started = true;
        self.last_update = now;
        self.display(total);
    }

    fn finish(&mut self) {
        if self.started {
            let mut stderr = io::stderr();
            let elapsed = self.start_time.elapsed();
            let _ = writeln!(
                stderr,
                "\r{}: {} in {:.2}s, done.",
                self.title,
                self.current,
                elapsed.as_secs_f64()
            );
            let _ = stderr.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_records_current() {
        let mut p = StderrProgress::new("scanning");
        p.delay_ms = 0;
        p.update(50, Some(100));
        assert_eq!(p.current, 50);
        assert!(p.started);
    }

    #[test]
    fn update_without_total() {
        let mut p = StderrProgress::new("walking");
        p.delay_ms = 0;
        p.update(42, None);
        assert_eq!(p.current, 42);
        assert!(p.started);
    }

    #[test]
    fn rate_limited_update_skips_same_percent() {
        let mut p = StderrProgress::new("scanning");
        p.delay_ms = 0;
        p.update(10, Some(1000));
        let first_percent = p.last_percent;
        p.update(11, Some(1000));
        assert_eq!(p.last_percent, first_percent);
    }

    #[test]
    fn finish_does_not_panic() {
        let mut p = StderrProgress::new("scanning");
        p.delay_ms = 0;
        p.update(100, Some(100));
        p.finish();
    }
}
