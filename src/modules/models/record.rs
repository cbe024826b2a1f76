use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::{CustomResult, Error};
use crate::modules::time_codec::{LapTimeTriple, TimeCodec};

/// column order is load bearing: existing files and downstream
/// spreadsheets expect exactly this header.
pub const CSV_HEADER: &str =
    "Fahrer;Minuten;Sekunden;Tausendstel;Zeit (s);Zeitstr;Erfasst am;Event";

pub const SEPARATOR: char = ';';

/// timestamps are written in this format only
const ISO_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";
/// older files carry this format, accepted on read and rewritten as iso
const LEGACY_TIMESTAMP: &str = "%d.%m.%Y %H:%M:%S";

/// # One captured lap time
/// immutable once created. correcting a typo means deleting the record
/// and entering a new one, there is no update in place.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct LapRecord {
    pub driver: String,
    pub event: String,
    pub minutes: u8,
    pub seconds: u8,
    pub milliseconds: u16,
    pub captured_at: NaiveDateTime,
}

/// # A submission that has passed the codec but is not stored yet
#[derive(Clone, Deserialize, Debug)]
pub struct NewLapRecord {
    pub driver: String,
    pub event: String,
    pub time: LapTimeTriple,
}

impl LapRecord {
    pub fn triple(&self) -> LapTimeTriple {
        LapTimeTriple {
            minutes: self.minutes,
            seconds: self.seconds,
            milliseconds: self.milliseconds,
        }
    }

    /// exact duration in milliseconds, the only value used for ordering.
    pub fn total_millis(&self) -> u32 {
        self.triple().total_millis()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.triple().duration_seconds()
    }

    /// canonical display string, a pure function of the digit triple.
    pub fn display_time(&self) -> String {
        TimeCodec::format(&self.triple())
    }

    /// # Serialize the record as one line of the backing document
    /// the `Zeit (s)` and `Zeitstr` columns are derived but written out
    /// anyway so the file stays readable without this program.
    pub fn to_csv_line(&self) -> String {
        format!(
            "{driver}{s}{minutes}{s}{seconds}{s}{millis}{s}{duration:.3}{s}{display}{s}{captured}{s}{event}",
            driver = self.driver,
            minutes = self.minutes,
            seconds = self.seconds,
            millis = self.milliseconds,
            duration = self.duration_seconds(),
            display = self.display_time(),
            captured = self.captured_at.format(ISO_TIMESTAMP),
            event = self.event,
            s = SEPARATOR,
        )
    }

    /// # Parse one line of the backing document
    /// the derived columns are ignored, the digit triple is the source
    /// of truth.
    ///
    /// ## Arguments
    /// * `line` - The line to parse, without its line terminator
    ///
    /// ## Returns
    /// * `LapRecord` - The parsed record
    pub fn from_csv_line(line: &str) -> CustomResult<LapRecord> {
        let fields: Vec<&str> = line.split(SEPARATOR).collect();
        if fields.len() != 8 {
            return Err(corrupt(format!(
                "expected 8 fields, got {}: {}",
                fields.len(),
                line
            )));
        }

        let minutes: u8 = fields[1]
            .trim()
            .parse()
            .map_err(|_| corrupt(format!("bad minutes field: {}", fields[1])))?;
        let seconds: u8 = fields[2]
            .trim()
            .parse()
            .map_err(|_| corrupt(format!("bad seconds field: {}", fields[2])))?;
        let milliseconds: u16 = fields[3]
            .trim()
            .parse()
            .map_err(|_| corrupt(format!("bad milliseconds field: {}", fields[3])))?;

        Ok(LapRecord {
            driver: fields[0].to_string(),
            event: fields[7].to_string(),
            minutes,
            seconds,
            milliseconds,
            captured_at: parse_timestamp(fields[6])?,
        })
    }
}

/// # Parse a captured-at timestamp
/// iso is the canonical format. the legacy `DD.MM.YYYY` format still
/// occurs in old files and is accepted on read; every write normalizes
/// it away.
pub fn parse_timestamp(raw: &str) -> CustomResult<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, ISO_TIMESTAMP)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, LEGACY_TIMESTAMP))
        .map_err(|_| corrupt(format!("unparseable timestamp: {}", raw)))
}

/// # Serialize a full snapshot
/// header line first, one line per record, insertion order preserved.
pub fn records_to_csv(records: &[LapRecord]) -> String {
    let mut document = String::from(CSV_HEADER);
    document.push('\n');
    for record in records {
        document.push_str(&record.to_csv_line());
        document.push('\n');
    }
    document
}

/// # Parse a full snapshot document
/// an empty or whitespace only document is an empty store. anything
/// else must carry the expected header and parseable lines; the caller
/// decides whether a corrupt document is fatal (mutations) or treated
/// as empty (reads).
pub fn parse_snapshot(contents: &str) -> CustomResult<Vec<LapRecord>> {
    let mut lines = contents.lines().filter(|line| !line.trim().is_empty());

    let header = match lines.next() {
        Some(header) => header,
        None => return Ok(Vec::new()),
    };
    if header.trim() != CSV_HEADER {
        return Err(corrupt(format!("unexpected header: {}", header)));
    }

    lines.map(LapRecord::from_csv_line).collect()
}

fn corrupt(message: String) -> Error {
    Error::StoreUnavailable { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(driver: &str, event: &str, raw: &str, captured: &str) -> LapRecord {
        let triple = TimeCodec::encode(raw).unwrap();
        LapRecord {
            driver: driver.to_string(),
            event: event.to_string(),
            minutes: triple.minutes,
            seconds: triple.seconds,
            milliseconds: triple.milliseconds,
            captured_at: parse_timestamp(captured).unwrap(),
        }
    }

    #[test]
    fn csv_line_layout() {
        let rec = record("Mika", "GP Berlin", "123456", "2024-05-01 18:30:00");
        assert_eq!(
            rec.to_csv_line(),
            "Mika;1;23;456;83.456;1:23.456;2024-05-01 18:30:00;GP Berlin"
        );
    }

    #[test]
    fn snapshot_round_trip_is_identity() {
        let records = vec![
            record("Mika", "GP Berlin", "123456", "2024-05-01 18:30:00"),
            record("Jo", "GP Berlin", "059012", "2024-05-01 18:31:07"),
            record("Mika", "Clubabend", "201500", "2024-05-02 09:00:00"),
        ];

        let reloaded = parse_snapshot(&records_to_csv(&records)).unwrap();
        assert_eq!(reloaded, records);
    }

    #[test]
    fn legacy_timestamps_are_normalized_on_write() {
        let rec = record("Jo", "Clubabend", "134999", "01.05.2024 18:30:00");
        assert_eq!(
            rec.captured_at,
            parse_timestamp("2024-05-01 18:30:00").unwrap()
        );
        assert!(rec.to_csv_line().contains("2024-05-01 18:30:00"));
    }

    #[test]
    fn empty_document_is_an_empty_store() {
        assert_eq!(parse_snapshot("").unwrap(), Vec::new());
        assert_eq!(parse_snapshot("  \n\n").unwrap(), Vec::new());
    }

    #[test]
    fn header_only_document_is_an_empty_store() {
        let document = format!("{}\n", CSV_HEADER);
        assert_eq!(parse_snapshot(&document).unwrap(), Vec::new());
    }

    #[test]
    fn corrupt_documents_are_reported() {
        assert!(parse_snapshot("not a lap time file").is_err());

        let bad_line = format!("{}\nMika;1;23\n", CSV_HEADER);
        assert!(parse_snapshot(&bad_line).is_err());

        let bad_minutes = format!("{}\nMika;x;23;456;83.456;1:23.456;2024-05-01 18:30:00;E\n", CSV_HEADER);
        assert!(parse_snapshot(&bad_minutes).is_err());
    }
}
