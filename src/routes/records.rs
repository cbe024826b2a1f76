use chrono::NaiveDateTime;
use log::warn;
use rocket::http::{ContentType, Status};
use rocket::serde::json::Json;
use rocket::{get, post, FromFormField, State};
use serde::{Deserialize, Serialize};

use crate::modules::leaderboard::LeaderboardEngine;
use crate::modules::models::event::EventRegistry;
use crate::modules::models::record::{records_to_csv, LapRecord, NewLapRecord};
use crate::modules::policy::EditabilityPolicy;
use crate::modules::store::{RecordId, RecordStore};
use crate::modules::time_codec::TimeCodec;

/**************************************************************************************************/
/**************** ROUTES **************************************************************************/
/**************************************************************************************************/

/***** MODIFY RECORDS *****/

/// # submit a new lap time
/// the raw time goes through the codec, the record lands in the store.
#[post("/records/new", data = "<new_record>")]
pub fn save_one(
    new_record: Json<NewRecordData>,
    store: &State<RecordStore>,
    registry: &State<EventRegistry>,
    policy: &State<EditabilityPolicy>,
) -> Result<Json<RecordView>, Status> {
    let data = new_record.into_inner();

    let driver = data.driver.trim();
    if driver.is_empty() {
        warn!(target: "routes/records:save_one", "submission without a driver name");
        return Err(Status::UnprocessableEntity);
    }
    if !registry.contains(&data.event) {
        warn!(target: "routes/records:save_one", "submission for unknown event: {}", data.event);
        return Err(Status::UnprocessableEntity);
    }

    let time = TimeCodec::encode(&data.raw_time).map_err(|error| {
        warn!(target: "routes/records:save_one", "rejected raw time {:?}: {}", data.raw_time, error);
        error.status()
    })?;

    let id = store
        .append(NewLapRecord {
            driver: driver.to_string(),
            event: data.event,
            time,
        })
        .map_err(|error| {
            warn!(target: "routes/records:save_one", "could not save lap: {}", error);
            error.status()
        })?;

    let snapshot = store.list_with_ids(None);
    let view = RecordView::bulk_new(&snapshot, policy)
        .into_iter()
        .find(|view| view.id == id)
        .ok_or(Status::InternalServerError)?;

    Ok(Json(view))
}

/// # delete a single record
/// only records inside the editability window may go; everything
/// older is locked and answers with 403.
#[post("/records/delete", data = "<id>")]
pub fn delete(
    id: Json<RecordId>,
    store: &State<RecordStore>,
    policy: &State<EditabilityPolicy>,
) -> Result<Status, Status> {
    let id = id.into_inner();

    // a mutation must see the real snapshot; the fail-open empty view
    // would make every record look locked
    let records = store.snapshot().map_err(|error| {
        warn!(target: "routes/records:delete", "could not load snapshot: {}", error);
        error.status()
    })?;
    if !policy.is_deletable(&records, &id) {
        warn!(
            target: "routes/records:delete",
            "refused delete of locked record (driver: {}, captured: {})",
            id.driver, id.captured_at
        );
        return Err(Status::Forbidden);
    }

    store.delete(&id).map_err(|error| {
        warn!(target: "routes/records:delete", "delete failed: {}", error);
        error.status()
    })?;

    Ok(Status::Ok)
}

/// # delete every record of one event
/// password gated, bypasses the editability window.
#[post("/records/delete-all", data = "<request>")]
pub fn delete_all(
    request: Json<BulkDeleteData>,
    store: &State<RecordStore>,
) -> Result<Json<BulkDeleteResult>, Status> {
    let request = request.into_inner();

    let removed = store
        .delete_all(&request.event, &request.password)
        .map_err(|error| {
            warn!(target: "routes/records:delete_all", "bulk delete failed: {}", error);
            error.status()
        })?;

    Ok(Json(BulkDeleteResult { removed }))
}

/***** GETTERS *****/

/// # get all records
/// optionally filtered to one event and one driver, newest first by
/// default or fastest first on request. every record is annotated
/// with whether it is still deletable, whether it counts towards its
/// driver's top 3 and whether it is the driver's best lap.
#[get("/records?<event>&<driver>&<sort>")]
pub fn get_all(
    event: Option<String>,
    driver: Option<String>,
    sort: Option<RecordSort>,
    store: &State<RecordStore>,
    policy: &State<EditabilityPolicy>,
) -> Json<Vec<RecordView>> {
    let snapshot = store.list_with_ids(None);

    let mut views: Vec<RecordView> = RecordView::bulk_new(&snapshot, policy)
        .into_iter()
        .filter(|view| event.as_deref().map_or(true, |name| view.event == name))
        .filter(|view| driver.as_deref().map_or(true, |name| view.driver == name))
        .collect();

    match sort.unwrap_or(RecordSort::Newest) {
        RecordSort::Newest => views.sort_by(|a, b| {
            b.captured_at
                .cmp(&a.captured_at)
                .then_with(|| b.id.index.cmp(&a.id.index))
        }),
        RecordSort::Fastest => views.sort_by(|a, b| {
            a.id.millis
                .cmp(&b.id.millis)
                .then_with(|| a.id.index.cmp(&b.id.index))
        }),
    }

    Json(views)
}

/// # download the records as a delimited text file
/// same layout as the backing document.
#[get("/records/csv?<event>")]
pub fn export_csv(event: Option<String>, store: &State<RecordStore>) -> (ContentType, String) {
    let records = store.list(event.as_deref());
    (ContentType::CSV, records_to_csv(&records))
}

/// # preview a partially typed time
/// pure formatting, never fails, validates nothing.
#[get("/records/live-format?<digits>")]
pub fn live_format(digits: Option<String>) -> Json<LiveFormatView> {
    Json(LiveFormatView {
        formatted: TimeCodec::live_format(digits.as_deref().unwrap_or("")),
    })
}

/**************************************************************************************************/
/**************** HELPERS *************************************************************************/
/**************************************************************************************************/

/// the two listing orders of the recent-times view.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromFormField)]
pub enum RecordSort {
    #[field(value = "newest")]
    Newest,
    #[field(value = "fastest")]
    Fastest,
}

#[derive(Deserialize)]
pub struct NewRecordData {
    pub driver: String,
    pub event: String,
    pub raw_time: String,
}

#[derive(Deserialize)]
pub struct BulkDeleteData {
    pub event: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct BulkDeleteResult {
    pub removed: usize,
}

#[derive(Serialize)]
pub struct LiveFormatView {
    pub formatted: String,
}

/// # Struct representing a json response for one stored record
#[derive(Serialize)]
pub struct RecordView {
    pub id: RecordId,
    pub driver: String,
    pub event: String,
    pub time: String,
    pub duration_seconds: f64,
    pub captured_at: NaiveDateTime,
    pub deletable: bool,
    pub within_personal_top3: bool,
    pub is_personal_best: bool,
}

impl RecordView {
    /// # Annotate a full snapshot for display
    /// deletability comes from the policy over the whole snapshot,
    /// the top 3 and personal best markers from the driver's own laps
    /// in the same event.
    pub fn bulk_new(
        snapshot: &[(RecordId, LapRecord)],
        policy: &EditabilityPolicy,
    ) -> Vec<RecordView> {
        let records: Vec<LapRecord> = snapshot.iter().map(|(_, record)| record.clone()).collect();
        let deletable = policy.deletable(&records);

        snapshot
            .iter()
            .map(|(id, record)| RecordView {
                id: id.clone(),
                driver: record.driver.clone(),
                event: record.event.clone(),
                time: record.display_time(),
                duration_seconds: record.duration_seconds(),
                captured_at: record.captured_at,
                deletable: deletable.contains(id),
                within_personal_top3: LeaderboardEngine::within_personal_top3(&records, record),
                is_personal_best: LeaderboardEngine::personal_best(
                    &records,
                    &record.event,
                    &record.driver,
                ) == Some(record.total_millis()),
            })
            .collect()
    }
}
