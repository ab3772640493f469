//! Page offset generation
//!
//! Offsets run `0, S, 2S, ...` up to an inclusive cap. The cap is a backstop
//! against runaway crawls; the scheduler's stop flag ends a normal crawl.

/// Lazy, restartable sequence of page offsets
///
/// The sequence holds no crawl state. Cloning it, or calling [`restart`],
/// yields the same offsets again from zero.
///
/// [`restart`]: OffsetSequence::restart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetSequence {
    stride: u64,
    cap: u64,
    next: Option<u64>,
}

impl OffsetSequence {
    /// Creates a sequence with the given stride and inclusive cap
    ///
    /// A zero stride would repeat offset 0 forever, so it is treated as 1.
    pub fn new(stride: u64, cap: u64) -> Self {
        Self {
            stride: stride.max(1),
            cap,
            next: Some(0),
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }

    /// Rewinds the sequence to offset zero
    pub fn restart(&mut self) {
        self.next = Some(0);
    }

    /// Returns true once every offset up to the cap has been produced
    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Total number of offsets the sequence produces from zero
    pub fn total(&self) -> u64 {
        self.cap / self.stride + 1
    }
}

impl Iterator for OffsetSequence {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let current = self.next?;
        if current > self.cap {
            self.next = None;
            return None;
        }
        self.next = current
            .checked_add(self.stride)
            .filter(|next| *next <= self.cap);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(current) if current <= self.cap => {
                let remaining = ((self.cap - current) / self.stride + 1) as usize;
                (remaining, Some(remaining))
            }
            _ => (0, Some(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stride_sequence() {
        let offsets: Vec<u64> = OffsetSequence::new(20, 9999).take(4).collect();
        assert_eq!(offsets, vec![0, 20, 40, 60]);
    }

    #[test]
    fn test_cap_is_inclusive() {
        let offsets: Vec<u64> = OffsetSequence::new(20, 40).collect();
        assert_eq!(offsets, vec![0, 20, 40]);

        let offsets: Vec<u64> = OffsetSequence::new(20, 59).collect();
        assert_eq!(offsets, vec![0, 20, 40]);
    }

    #[test]
    fn test_default_cap_total() {
        let sequence = OffsetSequence::new(20, 9999);
        assert_eq!(sequence.total(), 500);
        assert_eq!(sequence.count(), 500);
    }

    #[test]
    fn test_zero_cap_yields_first_page_only() {
        let offsets: Vec<u64> = OffsetSequence::new(20, 0).collect();
        assert_eq!(offsets, vec![0]);
    }

    #[test]
    fn test_exhaustion_and_restart() {
        let mut sequence = OffsetSequence::new(10, 10);
        assert_eq!(sequence.next(), Some(0));
        assert!(!sequence.is_exhausted());
        assert_eq!(sequence.next(), Some(10));
        assert!(sequence.is_exhausted());
        assert_eq!(sequence.next(), None);

        sequence.restart();
        assert_eq!(sequence.next(), Some(0));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = OffsetSequence::new(5, 100);
        original.next();
        original.next();

        let mut copy = original.clone();
        assert_eq!(copy.next(), Some(10));
        assert_eq!(original.next(), Some(10));
    }

    #[test]
    fn test_zero_stride_treated_as_one() {
        let offsets: Vec<u64> = OffsetSequence::new(0, 3).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_no_overflow_near_max() {
        let offsets: Vec<u64> = OffsetSequence::new(u64::MAX, u64::MAX).collect();
        assert_eq!(offsets, vec![0, u64::MAX]);
    }

    #[test]
    fn test_size_hint() {
        let mut sequence = OffsetSequence::new(20, 100);
        assert_eq!(sequence.size_hint(), (6, Some(6)));
        sequence.next();
        assert_eq!(sequence.size_hint(), (5, Some(5)));
    }
}
