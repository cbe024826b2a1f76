use std::collections::{HashMap, HashSet};
use std::env;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::modules::models::record::LapRecord;
use crate::modules::store::RecordId;

const DEFAULT_WINDOW: usize = 3;

/// whether the editability window counts across all events or within
/// each event separately. the recorded behaviour of the source system
/// drifted between the two, so it stays configurable; global is the
/// adopted default.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum PolicyScope {
    Global,
    PerEvent,
}

/// # Which records may still be deleted one by one
/// only the few most recently captured records are open for ad hoc
/// deletion; everything older is locked so finished standings cannot
/// be quietly rewritten. bulk deletion of a whole event goes through
/// the password gate in the store instead and ignores this window.
pub struct EditabilityPolicy {
    window: usize,
    scope: PolicyScope,
}

impl Default for EditabilityPolicy {
    fn default() -> Self {
        EditabilityPolicy::new(DEFAULT_WINDOW, PolicyScope::Global)
    }
}

impl EditabilityPolicy {
    pub fn new(window: usize, scope: PolicyScope) -> EditabilityPolicy {
        EditabilityPolicy { window, scope }
    }

    /// # Read the policy from the environment
    /// `DELETE_WINDOW` (number of records) and `DELETE_SCOPE`
    /// (`global` or `per-event`); unset or unparseable values fall
    /// back to the defaults.
    pub fn from_env() -> EditabilityPolicy {
        let window = match env::var("DELETE_WINDOW") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(target: "policy:from_env", "bad DELETE_WINDOW value: {}", raw);
                DEFAULT_WINDOW
            }),
            Err(_) => DEFAULT_WINDOW,
        };

        let scope = match env::var("DELETE_SCOPE").as_deref() {
            Ok("per-event") => PolicyScope::PerEvent,
            Ok("global") | Err(_) => PolicyScope::Global,
            Ok(other) => {
                warn!(target: "policy:from_env", "bad DELETE_SCOPE value: {}", other);
                PolicyScope::Global
            }
        };

        EditabilityPolicy::new(window, scope)
    }

    /// # The ids that may currently be deleted
    /// the `window` most recently captured records, taken over the
    /// whole snapshot or per event depending on the scope. captured-at
    /// has second resolution, so ties are broken by snapshot position:
    /// the later insertion is the more recent one.
    ///
    /// ## Arguments
    /// * `records` - The full snapshot, in insertion order
    ///
    /// ## Returns
    /// * `HashSet<RecordId>` - The deletable ids
    pub fn deletable(&self, records: &[LapRecord]) -> HashSet<RecordId> {
        match self.scope {
            PolicyScope::Global => self.most_recent(records.iter().enumerate().collect()),
            PolicyScope::PerEvent => {
                let mut by_event: HashMap<&str, Vec<(usize, &LapRecord)>> = HashMap::new();
                for (index, record) in records.iter().enumerate() {
                    by_event
                        .entry(record.event.as_str())
                        .or_default()
                        .push((index, record));
                }

                by_event
                    .into_values()
                    .flat_map(|group| self.most_recent(group))
                    .collect()
            }
        }
    }

    pub fn is_deletable(&self, records: &[LapRecord], id: &RecordId) -> bool {
        self.deletable(records).contains(id)
    }

    fn most_recent(&self, mut indexed: Vec<(usize, &LapRecord)>) -> HashSet<RecordId> {
        indexed.sort_by(|a, b| {
            b.1.captured_at
                .cmp(&a.1.captured_at)
                .then_with(|| b.0.cmp(&a.0))
        });

        indexed
            .into_iter()
            .take(self.window)
            .map(|(index, record)| RecordId::of(index, record))
            .collect()
    }
}
