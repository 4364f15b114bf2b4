use super::GroupingKernel;

/// The `percentile<N>` kernel: collects all values added during the bucket,
/// sorts, and takes the nearest-rank percentile.
#[derive(Debug)]
pub struct Percentile {
    rank: u8,
    values: Vec<f64>,
}

impl Percentile {
    pub fn new(rank: u8) -> Self {
        Percentile { rank: rank.min(100), values: Vec::new() }
    }
}

impl GroupingKernel for Percentile {
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
        // nearest-rank method: ceil(rank/100 * n), clamped into [1, n].
        let rank_idx = ((self.rank as f64 / 100.0) * n as f64).ceil() as usize;
        let idx = rank_idx.clamp(1, n) - 1;
        let result = self.values[idx];
        self.reset();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_via_percentile_50() {
        let mut k = Percentile::new(50);
        for v in [1.0, 2.0, 3.0, 4.0] {
            k.add(v);
        }
        assert!(k.flush().unwrap() >= 2.0);
    }

    #[test]
    fn p100_is_the_maximum() {
        let mut k = Percentile::new(100);
        for v in [5.0, 1.0, 9.0, 3.0] {
            k.add(v);
        }
        assert_eq!(k.flush(), Some(9.0));
    }

    #[test]
    fn constant_series_returns_constant_at_any_rank() {
        for rank in [25, 50, 90, 95, 99] {
            let mut k = Percentile::new(rank);
            for _ in 0..10 {
                k.add(4.0);
            }
            assert_eq!(k.flush(), Some(4.0));
        }
    }
}
