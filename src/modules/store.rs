use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime, Timelike};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{CustomResult, Error};
use crate::modules::models::record::{
    parse_snapshot, records_to_csv, LapRecord, NewLapRecord,
};

/// # The injected persistence collaborator
/// the store never owns i/o. whatever backs it only has to hand over
/// the whole document and accept a full replacement; there is no row
/// level primitive.
///
/// two writers that load the same snapshot and write back will race,
/// and the last write wins. accepted limitation of the snapshot model;
/// a version token checked on `replace` is the upgrade path.
pub trait SnapshotBackend: Send + Sync {
    /// the full document, or None if nothing was ever written.
    fn load(&self) -> CustomResult<Option<String>>;

    /// atomically replace the full document.
    fn replace(&self, contents: &str) -> CustomResult<()>;
}

/// # Local file backend
/// one delimited text file on disk, the same file the old spreadsheet
/// tooling reads.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> FileBackend {
        FileBackend { path: path.into() }
    }
}

impl SnapshotBackend for FileBackend {
    fn load(&self) -> CustomResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(Error::StoreUnavailable {
                message: format!("{}: {}", self.path.display(), error),
            }),
        }
    }

    fn replace(&self, contents: &str) -> CustomResult<()> {
        // write next to the target and rename over it, so a crash mid
        // write never leaves a half document behind
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, contents).map_err(|error| Error::StoreUnavailable {
            message: format!("{}: {}", staging.display(), error),
        })?;
        fs::rename(&staging, &self.path).map_err(|error| Error::StoreUnavailable {
            message: format!("{}: {}", self.path.display(), error),
        })
    }
}

/// # Remote blob backend
/// the document lives behind a single url, fetched and stored whole.
/// timeouts and retries are the client's business, not the store's.
pub struct BlobBackend {
    url: String,
    client: reqwest::blocking::Client,
}

impl BlobBackend {
    pub fn new(url: impl Into<String>) -> BlobBackend {
        BlobBackend {
            url: url.into(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl SnapshotBackend for BlobBackend {
    fn load(&self) -> CustomResult<Option<String>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|error| Error::StoreUnavailable {
                message: error.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // nothing uploaded yet, same as a missing file
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::StoreUnavailable {
                message: format!("blob fetch failed: {}", response.status()),
            });
        }

        response
            .text()
            .map(Some)
            .map_err(|error| Error::StoreUnavailable {
                message: error.to_string(),
            })
    }

    fn replace(&self, contents: &str) -> CustomResult<()> {
        let response = self
            .client
            .put(&self.url)
            .body(contents.to_string())
            .send()
            .map_err(|error| Error::StoreUnavailable {
                message: error.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::StoreUnavailable {
                message: format!("blob upload failed: {}", response.status()),
            });
        }
        Ok(())
    }
}

/// # Identity of a record within one snapshot
/// the position alone is not enough: after any other mutation the
/// collection may have shifted, so the id also remembers what the
/// record looked like. a delete with a stale id fails with NotFound
/// instead of silently removing a different record.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct RecordId {
    pub index: usize,
    pub driver: String,
    pub millis: u32,
    pub captured_at: NaiveDateTime,
}

impl RecordId {
    pub fn of(index: usize, record: &LapRecord) -> RecordId {
        RecordId {
            index,
            driver: record.driver.clone(),
            millis: record.total_millis(),
            captured_at: record.captured_at,
        }
    }

    fn matches(&self, record: &LapRecord) -> bool {
        self.driver == record.driver
            && self.millis == record.total_millis()
            && self.captured_at == record.captured_at
    }
}

/// # The lap record store
/// every operation is a full snapshot read-modify-write against the
/// injected backend. single threaded request/response, no locking.
pub struct RecordStore {
    backend: Box<dyn SnapshotBackend>,
    delete_password: String,
}

impl RecordStore {
    pub fn new(backend: Box<dyn SnapshotBackend>, delete_password: impl Into<String>) -> RecordStore {
        RecordStore {
            backend,
            delete_password: delete_password.into(),
        }
    }

    /// # Load the current snapshot
    /// missing backing data is an empty store. corrupt data is an
    /// error here; readers that want the fail-open behaviour go
    /// through [RecordStore::list].
    pub fn snapshot(&self) -> CustomResult<Vec<LapRecord>> {
        match self.backend.load()? {
            Some(contents) => parse_snapshot(&contents),
            None => Ok(Vec::new()),
        }
    }

    /// # List records, optionally filtered to one event
    /// fail open: a missing, unreachable or corrupt backing document
    /// is logged and treated as an empty store. a read must never take
    /// the page down.
    pub fn list(&self, event: Option<&str>) -> Vec<LapRecord> {
        self.list_with_ids(event)
            .into_iter()
            .map(|(_, record)| record)
            .collect()
    }

    /// # List records together with their snapshot ids
    /// ids index into the unfiltered snapshot, so they stay valid for
    /// [RecordStore::delete] no matter which event filter was applied.
    pub fn list_with_ids(&self, event: Option<&str>) -> Vec<(RecordId, LapRecord)> {
        let records = match self.snapshot() {
            Ok(records) => records,
            Err(error) => {
                warn!(target: "store:list", "treating backing data as empty: {}", error);
                Vec::new()
            }
        };

        records
            .into_iter()
            .enumerate()
            .filter(|(_, record)| event.map_or(true, |name| record.event == name))
            .map(|(index, record)| (RecordId::of(index, &record), record))
            .collect()
    }

    /// # Append a new lap record
    /// stamps the record with the current wall clock, clamped so that
    /// captured-at never decreases across the snapshot.
    ///
    /// ## Returns
    /// * `RecordId` - The id of the new record within the snapshot just written
    pub fn append(&self, new_record: NewLapRecord) -> CustomResult<RecordId> {
        let mut records = self.snapshot()?;

        let now = Local::now().naive_local();
        let now = now.with_nanosecond(0).unwrap_or(now);
        let captured_at = match records.last() {
            Some(last) if last.captured_at > now => last.captured_at,
            _ => now,
        };

        let record = LapRecord {
            driver: new_record.driver,
            event: new_record.event,
            minutes: new_record.time.minutes,
            seconds: new_record.time.seconds,
            milliseconds: new_record.time.milliseconds,
            captured_at,
        };

        records.push(record);
        self.backend.replace(&records_to_csv(&records))?;

        let index = records.len() - 1;
        info!(
            target: "store:append",
            "saved lap for {} in event {} ({})",
            records[index].driver, records[index].event, records[index].display_time()
        );
        Ok(RecordId::of(index, &records[index]))
    }

    /// # Delete one record by snapshot id
    /// the id must still point at the record it was read with. if the
    /// collection shifted underneath it the delete fails with NotFound
    /// and nothing is written.
    pub fn delete(&self, id: &RecordId) -> CustomResult<()> {
        let mut records = self.snapshot()?;

        match records.get(id.index) {
            Some(record) if id.matches(record) => {}
            _ => return Err(Error::NotFound),
        }

        let removed = records.remove(id.index);
        self.backend.replace(&records_to_csv(&records))?;

        info!(
            target: "store:delete",
            "deleted lap of {} captured at {}",
            removed.driver, removed.captured_at
        );
        Ok(())
    }

    /// # Delete every record of one event
    /// gated on the shared password and bypasses the editability
    /// window. wrong password means no effect at all.
    ///
    /// ## Returns
    /// * `usize` - How many records were removed
    pub fn delete_all(&self, event: &str, password: &str) -> CustomResult<usize> {
        // plain equality against a shared secret. known weakness, kept
        // as the configured behaviour.
        if password != self.delete_password {
            warn!(target: "store:delete_all", "bulk delete for {} rejected", event);
            return Err(Error::Unauthorized);
        }

        let mut records = self.snapshot()?;
        let before = records.len();
        records.retain(|record| record.event != event);
        let removed = before - records.len();

        if removed > 0 {
            self.backend.replace(&records_to_csv(&records))?;
        }

        info!(target: "store:delete_all", "removed {} records of event {}", removed, event);
        Ok(removed)
    }
}

#[cfg(test)]
pub mod test_support {
    use std::sync::Mutex;

    use super::SnapshotBackend;
    use crate::errors::{CustomResult, Error};

    /// in memory stand-in for the file/blob collaborators.
    pub struct MemoryBackend {
        pub contents: Mutex<Option<String>>,
    }

    impl MemoryBackend {
        pub fn empty() -> MemoryBackend {
            MemoryBackend {
                contents: Mutex::new(None),
            }
        }

        pub fn with(contents: &str) -> MemoryBackend {
            MemoryBackend {
                contents: Mutex::new(Some(contents.to_string())),
            }
        }
    }

    impl SnapshotBackend for MemoryBackend {
        fn load(&self) -> CustomResult<Option<String>> {
            Ok(self.contents.lock().unwrap().clone())
        }

        fn replace(&self, contents: &str) -> CustomResult<()> {
            *self.contents.lock().unwrap() = Some(contents.to_string());
            Ok(())
        }
    }

    /// backend that is never reachable.
    pub struct UnreachableBackend;

    impl SnapshotBackend for UnreachableBackend {
        fn load(&self) -> CustomResult<Option<String>> {
            Err(Error::StoreUnavailable {
                message: "unreachable".to_string(),
            })
        }

        fn replace(&self, _contents: &str) -> CustomResult<()> {
            Err(Error::StoreUnavailable {
                message: "unreachable".to_string(),
            })
        }
    }
}
