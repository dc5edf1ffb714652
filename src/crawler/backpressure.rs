//! Pending-queue hysteresis
//!
//! URL discovery suspends when the pending-page count crosses the high
//! watermark and resumes only after it falls below the low one. The gap
//! between the two keeps the suspend flag from flapping while workers
//! drain the queue.

/// Two-threshold gate over the pending-page count
#[derive(Debug)]
pub struct Hysteresis {
    high: u64,
    low: u64,
    engaged: bool,
}

impl Hysteresis {
    pub fn new(high: u64, low: u64) -> Self {
        Self {
            high,
            low,
            engaged: false,
        }
    }

    /// Feeds the latest pending count; returns whether discovery should be
    /// suspended from now on
    pub fn observe(&mut self, pending: u64) -> bool {
        if self.engaged {
            if pending < self.low {
                self.engaged = false;
            }
        } else if pending >= self.high {
            self.engaged = true;
        }
        self.engaged
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_released() {
        let mut gate = Hysteresis::new(50_000, 2_000);
        assert!(!gate.observe(0));
        assert!(!gate.observe(49_999));
    }

    #[test]
    fn engages_at_high_watermark() {
        let mut gate = Hysteresis::new(50_000, 2_000);
        assert!(gate.observe(50_000));
        assert!(gate.engaged());
    }

    #[test]
    fn stays_engaged_between_watermarks() {
        let mut gate = Hysteresis::new(50_000, 2_000);
        gate.observe(60_000);
        assert!(gate.observe(30_000));
        assert!(gate.observe(2_000));
    }

    #[test]
    fn releases_below_low_watermark() {
        let mut gate = Hysteresis::new(50_000, 2_000);
        gate.observe(60_000);
        assert!(!gate.observe(1_999));
        // And stays released until the high watermark again
        assert!(!gate.observe(49_999));
        assert!(gate.observe(50_000));
    }
}
