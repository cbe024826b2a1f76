use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::modules::models::record::LapRecord;
use crate::modules::time_codec::TimeCodec;

/// a driver needs this many recorded laps in an event before they are
/// ranked at all. fewer laps means no entry, not partial credit.
pub const QUALIFYING_LAPS: usize = 3;

/// presentation tier for the podium ranks. the rank number is the
/// contract, the tier is just its label.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Gold,
    Silver,
    Bronze,
}

impl Tier {
    fn for_rank(rank: usize) -> Option<Tier> {
        match rank {
            1 => Some(Tier::Gold),
            2 => Some(Tier::Silver),
            3 => Some(Tier::Bronze),
            _ => None,
        }
    }
}

/// # One row of the computed standings
/// derived on every query, never stored.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub driver: String,
    /// mean of the 3 fastest laps, in milliseconds
    pub average_millis: u32,
    pub average_display: String,
    /// the single fastest lap, in milliseconds
    pub best_millis: u32,
    pub best_display: String,
    pub tier: Option<Tier>,
}

pub struct LeaderboardEngine;

impl LeaderboardEngine {
    /// # Compute the standings of one event
    /// filter to the event, group by driver, keep drivers with at
    /// least [QUALIFYING_LAPS] laps, rank ascending by the mean of
    /// their 3 fastest laps. ties are broken by driver name so the
    /// ordering is deterministic; ranks are dense, 1..n.
    ///
    /// ## Arguments
    /// * `records` - The full record snapshot
    /// * `event` - The event to rank
    ///
    /// ## Returns
    /// * `Vec<LeaderboardEntry>` - The standings, best driver first
    pub fn rank(records: &[LapRecord], event: &str) -> Vec<LeaderboardEntry> {
        let mut times_by_driver: HashMap<&str, Vec<u32>> = HashMap::new();
        for record in records.iter().filter(|record| record.event == event) {
            times_by_driver
                .entry(record.driver.as_str())
                .or_default()
                .push(record.total_millis());
        }

        let mut keyed: Vec<(u32, &str, u32)> = Vec::new();
        for (driver, mut times) in times_by_driver {
            if times.len() < QUALIFYING_LAPS {
                continue;
            }
            times.sort_unstable();

            // the sum of the 3 fastest orders the same as their mean
            // and stays in integer arithmetic
            let top3_sum: u32 = times[..QUALIFYING_LAPS].iter().sum();
            keyed.push((top3_sum, driver, times[0]));
        }

        keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        keyed
            .into_iter()
            .enumerate()
            .map(|(position, (top3_sum, driver, best))| {
                let rank = position + 1;
                let average = average_of_top3(top3_sum);
                LeaderboardEntry {
                    rank,
                    driver: driver.to_string(),
                    average_millis: average,
                    average_display: TimeCodec::format_millis(average),
                    best_millis: best,
                    best_display: TimeCodec::format_millis(best),
                    tier: Tier::for_rank(rank),
                }
            })
            .collect()
    }

    /// # Is this record one of its driver's 3 fastest in the event?
    /// used by the display layer to mark laps that count towards the
    /// ranking key. a time tied with the third fastest counts as
    /// within the top 3.
    pub fn within_personal_top3(records: &[LapRecord], record: &LapRecord) -> bool {
        let faster = records
            .iter()
            .filter(|other| other.event == record.event && other.driver == record.driver)
            .filter(|other| other.total_millis() < record.total_millis())
            .count();
        faster < QUALIFYING_LAPS
    }

    /// the single fastest lap of one driver in one event, if any.
    pub fn personal_best(records: &[LapRecord], event: &str, driver: &str) -> Option<u32> {
        records
            .iter()
            .filter(|record| record.event == event && record.driver == driver)
            .map(|record| record.total_millis())
            .min()
    }

    /// # Render the standings as a download document
    /// same separator as the record file, one row per ranked driver.
    pub fn to_csv(entries: &[LeaderboardEntry]) -> String {
        let mut document = String::from("Platz;Fahrer;Durchschnitt (Top 3);Beste Zeit\n");
        for entry in entries {
            document.push_str(&format!(
                "{};{};{};{}\n",
                entry.rank, entry.driver, entry.average_display, entry.best_display
            ));
        }
        document
    }
}

/// mean of the 3 fastest laps, rounded to the nearest millisecond.
fn average_of_top3(top3_sum: u32) -> u32 {
    (top3_sum as f64 / QUALIFYING_LAPS as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::models::record::parse_timestamp;
    use crate::modules::time_codec::TimeCodec;

    fn record(driver: &str, event: &str, raw: &str) -> LapRecord {
        let triple = TimeCodec::encode(raw).unwrap();
        LapRecord {
            driver: driver.to_string(),
            event: event.to_string(),
            minutes: triple.minutes,
            seconds: triple.seconds,
            milliseconds: triple.milliseconds,
            captured_at: parse_timestamp("2024-05-01 18:30:00").unwrap(),
        }
    }

    #[test]
    fn ranking_key_is_the_mean_of_the_three_fastest() {
        // 10.0s, 12.0s and 11.0s -> mean 11.0s
        let records = vec![
            record("Mika", "GP", "010000"),
            record("Mika", "GP", "012000"),
            record("Mika", "GP", "011000"),
        ];

        let standings = LeaderboardEngine::rank(&records, "GP");
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].driver, "Mika");
        assert_eq!(standings[0].average_millis, 11_000);
        assert_eq!(standings[0].average_display, "0:11.000");
        assert_eq!(standings[0].best_millis, 10_000);
    }

    #[test]
    fn a_fourth_slower_lap_does_not_change_the_key() {
        let records = vec![
            record("Mika", "GP", "010000"),
            record("Mika", "GP", "012000"),
            record("Mika", "GP", "011000"),
            record("Mika", "GP", "059000"),
        ];

        let standings = LeaderboardEngine::rank(&records, "GP");
        assert_eq!(standings[0].average_millis, 11_000);
    }

    #[test]
    fn drivers_with_fewer_than_three_laps_are_excluded() {
        let records = vec![
            record("Mika", "GP", "010000"),
            record("Mika", "GP", "011000"),
            record("Jo", "GP", "009000"),
            record("Jo", "GP", "009100"),
            record("Jo", "GP", "009200"),
        ];

        let standings = LeaderboardEngine::rank(&records, "GP");
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].driver, "Jo");
    }

    #[test]
    fn records_of_other_events_do_not_count() {
        let records = vec![
            record("Mika", "GP", "010000"),
            record("Mika", "GP", "011000"),
            record("Mika", "Clubabend", "012000"),
        ];

        assert_eq!(LeaderboardEngine::rank(&records, "GP"), Vec::new());
    }

    #[test]
    fn ties_are_broken_by_driver_name() {
        let mut records = Vec::new();
        for raw in ["010000", "011000", "012000"] {
            records.push(record("Zoe", "GP", raw));
            records.push(record("Ann", "GP", raw));
        }

        let standings = LeaderboardEngine::rank(&records, "GP");
        assert_eq!(standings[0].driver, "Ann");
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[1].driver, "Zoe");
        assert_eq!(standings[1].rank, 2);
    }

    #[test]
    fn ranks_are_dense_and_tiers_stop_after_the_podium() {
        let mut records = Vec::new();
        for (driver, base) in [("Ann", "10"), ("Ben", "11"), ("Cleo", "12"), ("Dan", "13")] {
            for suffix in ["000", "100", "200"] {
                records.push(record(driver, "GP", &format!("0{}{}", base, suffix)));
            }
        }

        let standings = LeaderboardEngine::rank(&records, "GP");
        let ranks: Vec<usize> = standings.iter().map(|entry| entry.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);

        let tiers: Vec<Option<Tier>> = standings.iter().map(|entry| entry.tier).collect();
        assert_eq!(
            tiers,
            vec![
                Some(Tier::Gold),
                Some(Tier::Silver),
                Some(Tier::Bronze),
                None
            ]
        );
    }

    #[test]
    fn personal_top3_marks_the_three_fastest_laps() {
        let records = vec![
            record("Mika", "GP", "010000"),
            record("Mika", "GP", "011000"),
            record("Mika", "GP", "012000"),
            record("Mika", "GP", "013000"),
        ];

        assert!(LeaderboardEngine::within_personal_top3(&records, &records[0]));
        assert!(LeaderboardEngine::within_personal_top3(&records, &records[2]));
        assert!(!LeaderboardEngine::within_personal_top3(&records, &records[3]));
    }

    #[test]
    fn personal_top3_is_trivially_true_with_few_laps() {
        let records = vec![record("Mika", "GP", "013000")];
        assert!(LeaderboardEngine::within_personal_top3(&records, &records[0]));
    }

    #[test]
    fn personal_best_is_the_minimum() {
        let records = vec![
            record("Mika", "GP", "011000"),
            record("Mika", "GP", "010500"),
            record("Mika", "Clubabend", "010000"),
        ];

        assert_eq!(
            LeaderboardEngine::personal_best(&records, "GP", "Mika"),
            Some(10_500)
        );
        assert_eq!(LeaderboardEngine::personal_best(&records, "GP", "Jo"), None);
    }

    #[test]
    fn entries_serialize_with_lowercase_tiers() {
        let records = vec![
            record("Mika", "GP", "010000"),
            record("Mika", "GP", "011000"),
            record("Mika", "GP", "012000"),
        ];

        let standings = LeaderboardEngine::rank(&records, "GP");
        let json = serde_json::to_value(&standings).unwrap();

        assert_eq!(json[0]["rank"], 1);
        assert_eq!(json[0]["tier"], "gold");
        assert_eq!(json[0]["average_display"], "0:11.000");
        assert_eq!(json[0]["best_millis"], 10_000);
    }

    #[test]
    fn csv_projection_lists_ranked_rows() {
        let records = vec![
            record("Mika", "GP", "010000"),
            record("Mika", "GP", "011000"),
            record("Mika", "GP", "012000"),
        ];

        let standings = LeaderboardEngine::rank(&records, "GP");
        let csv = LeaderboardEngine::to_csv(&standings);
        assert_eq!(
            csv,
            "Platz;Fahrer;Durchschnitt (Top 3);Beste Zeit\n1;Mika;0:11.000;0:10.000\n"
        );
    }
}
