use super::GroupingKernel;

/// The `sum` kernel: a plain running total.
#[derive(Debug, Default)]
pub struct Sum {
    sum: f64,
    count: u64,
}

impl GroupingKernel for Sum {
    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn flush(&mut self) -> Option<f64> {
        let result = if self.count == 0 { None } else { Some(self.sum) };
        self.reset();
        result
    }
}

/// The `incremental-sum` kernel: sums only the positive increments between
/// successively added values (e.g. turning a monotonic counter into a
/// per-bucket delta). Declares `TierFetch::Average` (§4.4) because it reads
/// the tier's averaged raw value, not its sum, before differencing.
#[derive(Debug, Default)]
pub struct IncrementalSum {
    last: Option<f64>,
    sum: f64,
    count: u64,
}

impl GroupingKernel for IncrementalSum {
    fn reset(&mut self) {
        self.last = None;
        self.sum = 0.0;
        self.count = 0;
    }

    fn add(&mut self, value: f64) {
        if let Some(last) = self.last {
            let delta = value - last;
            if delta >= 0.0 {
                self.sum += delta;
            }
        }
        self.last = Some(value);
        self.count += 1;
    }

    fn flush(&mut self) -> Option<f64> {
        let result = if self.count == 0 { None } else { Some(self.sum) };
        // the last-seen value carries across buckets so the next bucket's
        // first increment is still measured against it.
        let carry = self.last;
        self.sum = 0.0;
        self.count = 0;
        self.last = carry;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_totals_added_values() {
        let mut k = Sum::default();
        k.add(1.0);
        k.add(2.0);
        k.add(3.0);
        assert_eq!(k.flush(), Some(6.0));
    }

    #[test]
    fn incremental_sum_counts_only_positive_deltas() {
        let mut k = IncrementalSum::default();
        k.add(10.0);
        k.add(15.0); // +5
        k.add(12.0); // counter reset/decrease, ignored
        k.add(20.0); // +8
        assert_eq!(k.flush(), Some(13.0));
    }

    #[test]
    fn incremental_sum_carries_last_value_across_flush() {
        let mut k = IncrementalSum::default();
        k.add(10.0);
        k.add(15.0);
        assert_eq!(k.flush(), Some(5.0));
        k.add(17.0); // +2 relative to carried last=15
        assert_eq!(k.flush(), Some(2.0));
    }
}
