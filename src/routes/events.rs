use log::warn;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde::Deserialize;

use crate::modules::models::event::EventRegistry;

/// # list all known event names
#[get("/events")]
pub fn get_all(registry: &State<EventRegistry>) -> Json<Vec<String>> {
    Json(registry.all())
}

/// # register a new event
/// the registry is append only; a name that already exists answers
/// with 409 and nothing changes.
#[post("/events/new", data = "<new_event>")]
pub fn save_one(new_event: Json<NewEventData>, registry: &State<EventRegistry>) -> Status {
    let name = new_event.name.trim();
    if name.is_empty() {
        warn!(target: "routes/events:save_one", "refused empty event name");
        return Status::UnprocessableEntity;
    }

    if registry.register(name) {
        Status::Created
    } else {
        Status::Conflict
    }
}

#[derive(Deserialize)]
pub struct NewEventData {
    pub name: String,
}
