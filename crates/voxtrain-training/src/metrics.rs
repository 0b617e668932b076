use regex::Regex;

/// Result of matching one trainer output line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// An epoch-marked metric bundle. `metrics` may be empty when the line
    /// carried no retained keys.
    Matched { step: u64, metrics: Vec<(String, f64)> },
    Unmatched,
}

/// Matcher for the trainer's progress lines.
///
/// The only contractual shape is
/// `[epoch N] key=value, key=value, ...`
/// from which the pairs whose key starts with `loss_` or is exactly `lr`
/// or `grad_norm` are retained, all sharing the epoch number as their step
/// index. Everything else the trainer prints is noise, not an error.
#[derive(Debug, Clone)]
pub struct LogParser {
    epoch_re: Regex,
}

impl LogParser {
    #[must_use]
    pub fn new() -> Self {
        // Pattern is a compile-time constant.
        let epoch_re = Regex::new(r"^\[epoch\s+(\d+)\]\s*(.*)$").expect("valid epoch pattern");
        Self { epoch_re }
    }

    #[must_use]
    pub fn parse_line(&self, line: &str) -> ParsedLine {
        let Some(caps) = self.epoch_re.captures(line.trim()) else {
            return ParsedLine::Unmatched;
        };
        let Ok(step) = caps[1].parse::<u64>() else {
            // Digit run too long for u64; treat the line as noise.
            return ParsedLine::Unmatched;
        };

        let mut metrics = Vec::new();
        for pair in caps[2].split(',') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if !is_retained_key(key) {
                continue;
            }
            let Ok(value) = value.trim().parse::<f64>() else {
                continue;
            };
            if !value.is_finite() {
                continue;
            }
            metrics.push((key.to_string(), value));
        }
        ParsedLine::Matched { step, metrics }
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_retained_key(key: &str) -> bool {
    key.starts_with("loss_") || key == "lr" || key == "grad_norm"
}
