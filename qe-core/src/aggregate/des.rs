use super::GroupingKernel;

const DEFAULT_ALPHA: f64 = 0.1;
const DEFAULT_BETA: f64 = 0.1;

/// The `des` kernel: double exponential smoothing (Holt's method), tracking
/// a level and a trend term. Options string carries two coefficients
/// (level, trend), comma- or whitespace-separated, each defaulting to 0.1
/// (supplemented from original_source's query options parsing, §4.4).
#[derive(Debug)]
pub struct Des {
    alpha: f64,
    beta: f64,
    level: Option<f64>,
    trend: f64,
    added: bool,
}

impl Des {
    pub fn from_options(options: &str) -> Self {
        let (alpha, beta) = parse_coefficients(options);
        Des { alpha, beta, level: None, trend: 0.0, added: false }
    }
}

fn parse_coefficients(options: &str) -> (f64, f64) {
    let mut parts = options
        .trim()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty());
    let alpha = parts.next().and_then(|s| s.parse::<f64>().ok()).unwrap_or(DEFAULT_ALPHA);
    let beta = parts.next().and_then(|s| s.parse::<f64>().ok()).unwrap_or(DEFAULT_BETA);
    (alpha, beta)
}

impl GroupingKernel for Des {
    fn reset(&mut self) {
        self.added = false;
    }

    fn add(&mut self, value: f64) {
        match self.level {
            None => {
                self.level = Some(value);
            }
            Some(level) => {
                let new_level = self.alpha * value + (1.0 - self.alpha) * (level + self.trend);
                self.trend = self.beta * (new_level - level) + (1.0 - self.beta) * self.trend;
                self.level = Some(new_level);
            }
        }
        self.added = true;
    }

    fn flush(&mut self) -> Option<f64> {
        let result = if self.added { self.level } else { None };
        self.reset();
        result
    }
}
