use super::GroupingKernel;

/// The `stddev` and `cv`/`rsd` kernels: Welford's online algorithm for
/// numerically stable mean/variance, shared between the two (§4.4 — "stddev
/// kernels use Welford-online state and share add/reset with cv"). `cv`
/// flushes `stddev / mean` instead of `stddev` alone.
#[derive(Debug, Default)]
pub struct StdDev {
    as_cv: bool,
    count: u64,
    mean: f64,
    m2: f64,
}

impl StdDev {
    pub fn new(as_cv: bool) -> Self {
        StdDev { as_cv, count: 0, mean: 0.0, m2: 0.0 }
    }
}

impl GroupingKernel for StdDev {
    fn reset(&mut self) {
        self.count = 0;
        self.mean = 0.0;
        self.m2 = 0.0;
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    fn flush(&mut self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let variance = if self.count > 1 { self.m2 / (self.count - 1) as f64 } else { 0.0 };
        let stddev = variance.sqrt();
        let result = if self.as_cv {
            if self.mean == 0.0 { 0.0 } else { (stddev / self.mean).abs() * 100.0 }
        } else {
            stddev
        };
        self.reset();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_has_zero_stddev() {
        let mut k = StdDev::new(false);
        for _ in 0..10 {
            k.add(5.0);
        }
        assert_eq!(k.flush(), Some(0.0));
    }

    #[test]
    fn stddev_matches_known_sample() {
        let mut k = StdDev::new(false);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            k.add(v);
        }
        let result = k.flush().unwrap();
        assert!((result - 2.13809).abs() < 1e-3);
    }

    #[test]
    fn cv_is_stddev_over_mean_as_percent() {
        let mut k = StdDev::new(true);
        for v in [10.0, 10.0, 10.0] {
            k.add(v);
        }
        assert_eq!(k.flush(), Some(0.0));
    }

    #[test]
    fn single_value_has_zero_stddev() {
        let mut k = StdDev::new(false);
        k.add(42.0);
        assert_eq!(k.flush(), Some(0.0));
    }
}
