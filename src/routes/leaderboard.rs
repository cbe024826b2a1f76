use rocket::http::ContentType;
use rocket::serde::json::Json;
use rocket::{get, State};

use crate::modules::leaderboard::{LeaderboardEngine, LeaderboardEntry};
use crate::modules::store::RecordStore;

/// # get the current standings of one event
/// recomputed from the full snapshot on every request, never cached,
/// so the ranking can not go stale.
#[get("/leaderboard/<event>")]
pub fn get_one(event: String, store: &State<RecordStore>) -> Json<Vec<LeaderboardEntry>> {
    let records = store.list(None);
    Json(LeaderboardEngine::rank(&records, &event))
}

/// # download the standings as a delimited text file
#[get("/leaderboard/<event>/csv")]
pub fn export_csv(event: String, store: &State<RecordStore>) -> (ContentType, String) {
    let records = store.list(None);
    let standings = LeaderboardEngine::rank(&records, &event);
    (ContentType::CSV, LeaderboardEngine::to_csv(&standings))
}
