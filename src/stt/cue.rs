//! Cue-line parsing.
//!
//! The engine prints one line per recognised segment:
//!
//! ```text
//! [00:00:07.900 --> 00:00:10.900]   hello world
//! ```
//!
//! [`parse_cue_line`] turns such a line into a [`Segment`] with millisecond
//! timestamps. Hours are optional (`mm:ss.mmm`), the fraction has 1–3 digits
//! and may use `.` or `,`, and the surrounding brackets may be omitted.
//! [`render_cue_line`] is the inverse and is what the whisper-rs backend
//! prints.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::stt::transcribe::Segment;

// ---------------------------------------------------------------------------
// CueParseError
// ---------------------------------------------------------------------------

/// Why a cue line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CueParseError {
    /// The line is not `[start --> end] text`.
    #[error("line does not match the cue pattern: {0:?}")]
    NoMatch(String),

    /// A timestamp component could not be parsed as a number.
    #[error("bad timestamp: {0:?}")]
    BadTimestamp(String),

    /// The end timestamp precedes the start timestamp.
    #[error("end time {end_ms} ms is before start time {start_ms} ms")]
    EndBeforeStart { start_ms: u64, end_ms: u64 },
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

/// `hh:mm:ss.f` or `mm:ss.f` with 1–3 fraction digits.
const TIMESTAMP: &str = r"[0-9]{1,2}:[0-9]{2}:[0-9]{2}[.,][0-9]{1,3}|[0-9]{1,2}:[0-9]{2}[.,][0-9]{1,3}";

static CUE_LINE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"^\s*\[?\s*({TIMESTAMP})\s*-->\s*({TIMESTAMP})\s*\]?\s*(.*?)\s*$");
    Regex::new(&pattern).expect("cue line regex is valid")
});

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one engine output line into a [`Segment`].
///
/// ```
/// use whisper_stream::stt::parse_cue_line;
///
/// let seg = parse_cue_line("[00:00:07.900 --> 00:00:10.900]   hello world").unwrap();
/// assert_eq!(seg.time_start, 7_900);
/// assert_eq!(seg.time_end, 10_900);
/// assert_eq!(seg.text, "hello world");
/// ```
pub fn parse_cue_line(line: &str) -> Result<Segment, CueParseError> {
    let caps = CUE_LINE
        .captures(line)
        .ok_or_else(|| CueParseError::NoMatch(line.to_string()))?;

    let start = parse_timestamp(&caps[1])?;
    let end = parse_timestamp(&caps[2])?;

    if end < start {
        return Err(CueParseError::EndBeforeStart {
            start_ms: start,
            end_ms: end,
        });
    }

    let text = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

    Ok(Segment {
        time_start: start,
        time_end: end,
        text: text.to_string(),
        raw: line.to_string(),
    })
}

/// Parse `hh:mm:ss.mmm` or `mm:ss.mmm` into whole milliseconds.
///
/// The fraction is read as a decimal fraction of a second, so `"05.9"` is
/// 5 900 ms and `"05.09"` is 5 090 ms. Digits past the third are truncated.
pub fn parse_timestamp(value: &str) -> Result<u64, CueParseError> {
    let bad = || CueParseError::BadTimestamp(value.to_string());

    let normalised = value.trim().replace(',', ".");
    let parts: Vec<&str> = normalised.split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (parse_component(h).ok_or_else(bad)?, parse_component(m).ok_or_else(bad)?, *s),
        [m, s] => (0, parse_component(m).ok_or_else(bad)?, *s),
        _ => return Err(bad()),
    };

    let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let whole = parse_component(whole).ok_or_else(bad)?;
    let fraction_ms = parse_fraction_ms(fraction).ok_or_else(bad)?;

    Ok(((hours * 60 + minutes) * 60 + whole) * 1_000 + fraction_ms)
}

fn parse_component(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `"9"` → 900, `"95"` → 950, `"957"` → 957, `"9571"` → 957.
fn parse_fraction_ms(fraction: &str) -> Option<u64> {
    if fraction.is_empty() {
        return Some(0);
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut ms = 0u64;
    for (i, digit) in fraction.bytes().take(3).enumerate() {
        ms += u64::from(digit - b'0') * 10u64.pow(2 - i as u32);
    }
    Some(ms)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Format a millisecond offset as `hh:mm:ss.mmm`.
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1_000) % 60;
    let millis = ms % 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Render a segment the way the engine prints it.
pub fn render_cue_line(segment: &Segment) -> String {
    format!(
        "[{} --> {}]  {}",
        format_timestamp(segment.time_start),
        format_timestamp(segment.time_end),
        segment.text
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
