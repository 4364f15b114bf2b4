use super::GroupingKernel;

/// The `average`/`avg`/`mean` kernel: a running sum and count, flushed as
/// their quotient.
#[derive(Debug, Default)]
pub struct Average {
    sum: f64,
    count: u64,
}

impl GroupingKernel for Average {
    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn flush(&mut self) -> Option<f64> {
        let result = if self.count == 0 { None } else { Some(self.sum / self.count as f64) };
        self.reset();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_added_values() {
        let mut k = Average::default();
        k.add(1.0);
        k.add(2.0);
        k.add(3.0);
        assert_eq!(k.flush(), Some(2.0));
    }

    #[test]
    fn empty_bucket_is_none() {
        let mut k = Average::default();
        assert_eq!(k.flush(), None);
    }

    #[test]
    fn flush_resets_for_next_bucket() {
        let mut k = Average::default();
        k.add(10.0);
        assert_eq!(k.flush(), Some(10.0));
        assert_eq!(k.flush(), None);
    }
}
