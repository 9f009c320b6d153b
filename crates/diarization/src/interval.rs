/// Time range in seconds. Treated as half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
}

impl TimeInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_valid(&self) -> bool {
        self.start >= 0.0 && self.end > self.start
    }

    /// Whether two intervals intersect. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        !(self.end <= other.start || self.start >= other.end)
    }
}
