use super::GroupingKernel;

const DEFAULT_ALPHA: f64 = 0.1;

/// The `ses`/`ema`/`ewma` kernel: single exponential smoothing. Each added
/// value updates a running smoothed level; the bucket flushes the level as
/// of its last added value. The smoothing coefficient can be overridden via
/// the options string (a single float, e.g. `"0.3"`), defaulting to 0.1
/// (supplemented from original_source's query options parsing, §4.4).
#[derive(Debug)]
pub struct Ses {
    alpha: f64,
    level: Option<f64>,
    added: bool,
}

impl Ses {
    pub fn from_options(options: &str) -> Self {
        let alpha = parse_alpha(options).unwrap_or(DEFAULT_ALPHA);
        Ses { alpha, level: None, added: false }
    }
}

fn parse_alpha(options: &str) -> Option<f64> {
    let trimmed = options.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.split(|c: char| c.is_whitespace() || c == ',').next()?.parse::<f64>().ok()
}

impl GroupingKernel for Ses {
    fn reset(&mut self) {
        self.added = false;
    }

    fn add(&mut self, value: f64) {
        self.level = Some(match self.level {
            None => value,
            Some(level) => self.alpha * value + (1.0 - self.alpha) * level,
        });
        self.added = true;
    }

    fn flush(&mut self) -> Option<f64> {
        let result = if self.added { self.level } else { None };
        self.reset();
        result
    }
}
