use super::GroupingKernel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparator {
    fn matches(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Equal => value == threshold,
            Comparator::NotEqual => value != threshold,
            Comparator::Greater => value > threshold,
            Comparator::GreaterOrEqual => value >= threshold,
            Comparator::Less => value < threshold,
            Comparator::LessOrEqual => value <= threshold,
        }
    }
}

/// The `countif` kernel: the percentage of values in the bucket satisfying
/// `<op><threshold>` (options string format, default `"!=0"` — supplemented
/// from original_source's query options parsing, §4.4).
#[derive(Debug)]
pub struct CountIf {
    comparator: Comparator,
    threshold: f64,
    matched: u64,
    total: u64,
}

impl CountIf {
    pub fn from_options(options: &str) -> Self {
        let (comparator, threshold) = parse_options(options).unwrap_or((Comparator::NotEqual, 0.0));
        CountIf { comparator, threshold, matched: 0, total: 0 }
    }
}

fn parse_options(options: &str) -> Option<(Comparator, f64)> {
    let trimmed = options.trim();
    if trimmed.is_empty() {
        return None;
    }

    const OPERATORS: [(&str, Comparator); 6] = [
        (">=", Comparator::GreaterOrEqual),
        ("<=", Comparator::LessOrEqual),
        ("!=", Comparator::NotEqual),
        ("==", Comparator::Equal),
        (">", Comparator::Greater),
        ("<", Comparator::Less),
    ];

    for (token, comparator) in OPERATORS {
        if let Some(rest) = trimmed.strip_prefix(token) {
            return rest.trim().parse::<f64>().ok().map(|threshold| (comparator, threshold));
        }
    }

    if let Some(rest) = trimmed.strip_prefix('=') {
        return rest.trim().parse::<f64>().ok().map(|threshold| (Comparator::Equal, threshold));
    }

    None
}

impl GroupingKernel for CountIf {
    fn reset(&mut self) {
        self.matched = 0;
        self.total = 0;
    }

    fn add(&mut self, value: f64) {
        self.total += 1;
        if self.comparator.matches(value, self.threshold) {
            self.matched += 1;
        }
    }

    fn flush(&mut self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let result = (self.matched as f64 / self.total as f64) * 100.0;
        self.reset();
        Some(result)
    }
}
