use super::GroupingKernel;

/// The `trimmed-mean<N>` and `median`/`trimmed-median<N>` kernels: collect
/// all values added during the bucket, sort, drop `trim_fraction` of
/// values off each end, and average (or take the midpoint of) what
/// remains. `median` is `trim_fraction == 0.0, as_median == true`: the
/// midpoint with nothing trimmed.
#[derive(Debug, Default)]
pub struct TrimmedMean {
    trim_fraction: f64,
    as_median: bool,
    values: Vec<f64>,
}

impl TrimmedMean {
    pub fn new(trim_fraction: f64, as_median: bool) -> Self {
        TrimmedMean { trim_fraction, as_median, values: Vec::new() }
    }
}

impl GroupingKernel for TrimmedMean {
    fn reset(&mut self) {
        self.values.clear();
    }

    fn add(&mut self, value: f64) {
        self.values.push(value);
    }

    fn flush(&mut self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }

        self.values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = self.values.len();
        let trim = ((n as f64) * self.trim_fraction).floor() as usize;
        let trim = trim.min((n - 1) / 2);
        let slice = &self.values[trim..n - trim];

        let result = if self.as_median {
            let m = slice.len();
            if m % 2 == 1 {
                slice[m / 2]
            } else {
                (slice[m / 2 - 1] + slice[m / 2]) / 2.0
            }
        } else {
            slice.iter().sum::<f64>() / slice.len() as f64
        };

        self.reset();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_count() {
        let mut k = TrimmedMean::new(0.0, true);
        for v in [5.0, 1.0, 3.0] {
            k.add(v);
        }
        assert_eq!(k.flush(), Some(3.0));
    }

    #[test]
    fn median_of_even_count_averages_middle_two() {
        let mut k = TrimmedMean::new(0.0, true);
        for v in [1.0, 2.0, 3.0, 4.0] {
            k.add(v);
        }
        assert_eq!(k.flush(), Some(2.5));
    }

    #[test]
    fn trimmed_mean_drops_outliers() {
        let mut k = TrimmedMean::new(0.25, false);
        for v in [1.0, 2.0, 3.0, 4.0, 100.0] {
            k.add(v);
        }
        // trim = floor(5*0.25) = 1 from each end -> [2,3,4] -> mean 3
        assert_eq!(k.flush(), Some(3.0));
    }

    #[test]
    fn constant_series_returns_constant() {
        let mut k = TrimmedMean::new(0.05, false);
        for _ in 0..20 {
            k.add(7.0);
        }
        assert_eq!(k.flush(), Some(7.0));
    }
}
