use super::GroupingKernel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Min,
    Max,
}

#[derive(Debug)]
pub struct MinMax {
    kind: Kind,
    value: Option<f64>,
}

impl MinMax {
    pub fn new(kind: Kind) -> Self {
        MinMax { kind, value: None }
    }
}

impl GroupingKernel for MinMax {
    fn reset(&mut self) {
        self.value = None;
    }

    fn add(&mut self, value: f64) {
        self.value = Some(match self.value {
            None => value,
            Some(current) => match self.kind {
                Kind::Min => current.min(value),
                Kind::Max => current.max(value),
            },
        });
    }

    fn flush(&mut self) -> Option<f64> {
        let result = self.value;
        self.reset();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_tracks_lowest() {
        let mut k = MinMax::new(Kind::Min);
        k.add(3.0);
        k.add(1.0);
        k.add(2.0);
        assert_eq!(k.flush(), Some(1.0));
    }

    #[test]
    fn max_tracks_highest() {
        let mut k = MinMax::new(Kind::Max);
        k.add(3.0);
        k.add(1.0);
        k.add(2.0);
        assert_eq!(k.flush(), Some(3.0));
    }
}
