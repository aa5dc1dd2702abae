pub const DEFAULT_WINDOW_SECS: i64 = 120;

/// Decides when accumulated changes are due for a checkpoint.
///
/// Driven purely by event time: the window advances only as fast as the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointWindow {
    last_flush: i64,
    window_secs: i64,
}

impl CheckpointWindow {
    pub fn new(window_secs: i64) -> Self {
        Self {
            last_flush: 0,
            window_secs,
        }
    }

    pub fn last_flush(&self) -> i64 {
        self.last_flush
    }

    pub fn is_due(&self, ts: i64) -> bool {
        ts.saturating_sub(self.last_flush) > self.window_secs
    }

    /// Records a checkpoint evaluation at `ts`, whether or not anything was written.
    pub fn mark(&mut self, ts: i64) {
        self.last_flush = ts;
    }
}

impl Default for CheckpointWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_only_strictly_past_the_window() {
        let w = CheckpointWindow::default();
        assert!(!w.is_due(0));
        assert!(!w.is_due(120));
        assert!(w.is_due(121));
    }

    #[test]
    fn window_follows_last_mark() {
        let mut w = CheckpointWindow::default();
        let mut flushed_at = Vec::new();
        for ts in [0, 50, 130, 140] {
            if w.is_due(ts) {
                flushed_at.push(ts);
                w.mark(ts);
            }
        }
        assert_eq!(flushed_at, vec![130]);
        assert_eq!(w.last_flush(), 130);
    }

    #[test]
    fn out_of_order_timestamps_are_never_due() {
        let mut w = CheckpointWindow::new(10);
        w.mark(1_000);
        assert!(!w.is_due(500));
        assert!(w.is_due(1_011));
    }
}
