use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{CustomResult, Error, FormatError};

/// the raw input format: one minute digit, two second digits, three
/// millisecond digits, nothing else.
const RAW_SHAPE: &str = r"^[0-9]{6}$";

/// compiled once, every submission goes through it.
fn raw_shape() -> &'static Regex {
    static RAW_SHAPE_RE: OnceLock<Regex> = OnceLock::new();
    RAW_SHAPE_RE.get_or_init(|| Regex::new(RAW_SHAPE).unwrap())
}

/// # A validated lap time
/// `minutes` is a single digit by construction of the encoding, so a
/// lap can never be 10 minutes or longer.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct LapTimeTriple {
    pub minutes: u8,
    pub seconds: u8,
    pub milliseconds: u16,
}

impl LapTimeTriple {
    /// exact duration in milliseconds. used for all ordering and
    /// averaging so repeated round trips never drift.
    pub fn total_millis(&self) -> u32 {
        self.minutes as u32 * 60_000 + self.seconds as u32 * 1_000 + self.milliseconds as u32
    }

    /// duration in seconds, for display and the `Zeit (s)` column only.
    pub fn duration_seconds(&self) -> f64 {
        self.total_millis() as f64 / 1000.0
    }
}

pub struct TimeCodec;

impl TimeCodec {
    /// # Parse a raw 6 digit time string
    /// digit 0 is the minute, digits 1-2 the seconds, digits 3-5 the
    /// milliseconds.
    ///
    /// ## Arguments
    /// * `raw` - The raw string as typed by the user
    ///
    /// ## Returns
    /// * `LapTimeTriple` - The validated time
    pub fn encode(raw: &str) -> CustomResult<LapTimeTriple> {
        if raw.chars().count() != 6 {
            return Err(Error::invalid(FormatError::BadLength {
                length: raw.chars().count(),
            }));
        }

        if !raw_shape().is_match(raw) {
            return Err(Error::invalid(FormatError::NonDigit));
        }

        // the shape check guarantees these slices parse
        let minutes: u8 = raw[0..1].parse().unwrap();
        let seconds: u8 = raw[1..3].parse().unwrap();
        let milliseconds: u16 = raw[3..6].parse().unwrap();

        if seconds > 59 {
            return Err(Error::invalid(FormatError::SecondsOutOfRange { seconds }));
        }
        if milliseconds > 999 {
            return Err(Error::invalid(FormatError::MillisecondsOutOfRange {
                milliseconds,
            }));
        }

        let triple = LapTimeTriple {
            minutes,
            seconds,
            milliseconds,
        };

        // a zero duration lap is not a lap
        if triple.total_millis() == 0 {
            return Err(Error::invalid(FormatError::ZeroDuration));
        }

        Ok(triple)
    }

    /// exact duration of a triple in milliseconds.
    pub fn decode(triple: &LapTimeTriple) -> u32 {
        triple.total_millis()
    }

    /// # Render a triple as its canonical display string
    /// `"{m}:{ss}.{mmm}"`, seconds and milliseconds zero padded.
    pub fn format(triple: &LapTimeTriple) -> String {
        format!(
            "{}:{:02}.{:03}",
            triple.minutes, triple.seconds, triple.milliseconds
        )
    }

    /// # Render a millisecond count as a display string
    /// same shape as [TimeCodec::format], used for derived values like
    /// a top 3 average that never existed as a typed-in triple.
    pub fn format_millis(millis: u32) -> String {
        let minutes = millis / 60_000;
        let seconds = (millis % 60_000) / 1_000;
        let milliseconds = millis % 1_000;
        format!("{}:{:02}.{:03}", minutes, seconds, milliseconds)
    }

    /// # Format a partially typed time
    /// pure prefix formatting over however many digits have been typed
    /// so far. non digits are stripped, anything past 6 digits is cut
    /// off, and no amount of garbage makes this fail. never use this
    /// to validate a final submission.
    pub fn live_format(raw: &str) -> String {
        let clean: String = raw.chars().filter(|c| c.is_ascii_digit()).take(6).collect();

        let mut formatted = String::new();
        if !clean.is_empty() {
            formatted.push_str(&clean[0..1]);
            formatted.push(':');
        }
        if clean.len() >= 3 {
            formatted.push_str(&clean[1..3]);
            formatted.push('.');
        }
        if clean.len() > 3 {
            formatted.push_str(&clean[3..]);
        }

        formatted
    }
}
