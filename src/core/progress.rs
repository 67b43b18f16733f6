use once_cell::sync::Lazy;
use regex::Regex;

static RE_CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):(\d{2}):(\d{2}(?:\.\d+)?)$").unwrap());
static RE_TIME_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=\s*(\d{1,3}:\d{2}:\d{2}(?:\.\d+)?|\d+(?:\.\d+)?)").unwrap());

/// One decoded `time=` sample from the ffmpeg diagnostic stream.
/// `ratio` is `None` whenever no usable total duration is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub current_time_sec: f64,
    pub ratio: Option<f64>,
}

/// Converts `H:MM:SS[.frac]` or bare seconds to seconds. Empty or
/// unparseable text is `None`, never an error.
pub fn parse_time(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = RE_CLOCK.captures(trimmed) {
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        return Some(hours * 3600.0 + minutes * 60.0 + seconds);
    }

    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Decodes one stderr line into a progress sample. Most lines carry no
/// `time=` field and decode to `None`; the caller just skips those.
pub fn parse_progress(line: &str, total_duration_sec: Option<f64>) -> Option<ProgressSample> {
    let caps = RE_TIME_FIELD.captures(line)?;
    let current_time_sec = parse_time(&caps[1])?;

    let ratio = match total_duration_sec {
        Some(total) if total.is_finite() && total > 0.0 => {
            Some((current_time_sec / total).min(1.0))
        }
        _ => None,
    };

    Some(ProgressSample {
        current_time_sec,
        ratio,
    })
}
