/// Debounced rising-edge detector over raw input samples.
///
/// The first sample only primes the detector. After that a press is
/// reported when a sample exceeds the previous one by more than
/// `threshold`. A plain 0/1 level input (sysfs) needs 0, the default. A
/// counting interrupt input (the value is a tick count) can use 5 to filter
/// contact bounce.
#[derive(Debug, Clone)]
pub struct RisingEdge {
    threshold: i64,
    last: Option<i64>,
}

impl RisingEdge {
    pub fn new(threshold: i64) -> Self {
        Self {
            threshold,
            last: None,
        }
    }

    /// Feed one sample; returns `true` when it counts as a press.
    pub fn observe(&mut self, sample: i64) -> bool {
        let pressed = match self.last {
            None => false,
            Some(previous) => sample > previous.saturating_add(self.threshold),
        };
        self.last = Some(sample);
        pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_only_primes() {
        let mut edge = RisingEdge::new(5);
        assert!(!edge.observe(100));
    }

    #[test]
    fn small_jitter_is_ignored() {
        let mut edge = RisingEdge::new(5);
        edge.observe(10);
        assert!(!edge.observe(15));
        assert!(!edge.observe(20));
        assert!(!edge.observe(12));
    }

    #[test]
    fn jump_above_threshold_is_a_press() {
        let mut edge = RisingEdge::new(5);
        edge.observe(10);
        assert!(edge.observe(16));
    }

    #[test]
    fn level_input_with_zero_threshold() {
        let mut edge = RisingEdge::new(0);
        edge.observe(0);
        assert!(!edge.observe(0));
        assert!(edge.observe(1));
        assert!(!edge.observe(1));
        assert!(!edge.observe(0));
        assert!(edge.observe(1));
    }

    #[test]
    fn falling_value_never_fires() {
        let mut edge = RisingEdge::new(5);
        edge.observe(100);
        assert!(!edge.observe(0));
    }
}
