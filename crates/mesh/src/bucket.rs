//! The per-triangle sample bucket.

use retin_geometry::Point;

/// Unordered collection of raster samples inside one triangle, with a running
/// pointer to the sample of largest approximation error.
#[derive(Debug)]
pub struct Bucket {
    samples: Vec<Point>,
    worst: usize,
    worst_error: f64,
}

impl Bucket {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            worst: 0,
            worst_error: 0.0,
        }
    }

    /// Add a sample with its precomputed error against the owning triangle.
    /// The first sample of strictly largest error becomes the worst one.
    pub fn push(&mut self, sample: Point, error: f64) {
        if self.samples.is_empty() || error > self.worst_error {
            self.worst = self.samples.len();
            self.worst_error = error;
        }
        self.samples.push(sample);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// The sample with the largest error, together with that error.
    pub fn worst(&self) -> Option<(Point, f64)> {
        self.samples.get(self.worst).map(|&s| (s, self.worst_error))
    }

    /// Largest error in the bucket; 0 for an empty bucket.
    pub fn worst_error(&self) -> f64 {
        self.worst_error
    }

    pub fn into_samples(self) -> Vec<Point> {
        self.samples
    }
}

impl Default for Bucket {
    fn default() -> Self {
        Self::new()
    }
}
