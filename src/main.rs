use std::env;

use dotenvy::dotenv;
use rocket::{Build, Rocket};

use racekino_rundenzeiten::modules::helpers::logging::setup_logging;
use racekino_rundenzeiten::modules::models::event::EventRegistry;
use racekino_rundenzeiten::modules::policy::EditabilityPolicy;
use racekino_rundenzeiten::modules::store::{
    BlobBackend, FileBackend, RecordStore, SnapshotBackend,
};
use racekino_rundenzeiten::routes::{events, leaderboard, records};

#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    setup_logging().expect("Failed to setup logging");

    // the store never owns i/o: pick the snapshot collaborator here
    // and inject it. a url wins over a file path.
    let backend: Box<dyn SnapshotBackend> = match env::var("LAP_STORE_URL") {
        Ok(url) => Box::new(BlobBackend::new(url)),
        Err(_) => {
            let path =
                env::var("LAP_STORE_PATH").unwrap_or_else(|_| "rundenzeiten.csv".to_string());
            Box::new(FileBackend::new(path))
        }
    };

    let password = env::var("DELETE_PASSWORD").expect("DELETE_PASSWORD must be set");
    let store = RecordStore::new(backend, password);

    // every event referenced by the existing records is known from the start
    let registry = EventRegistry::new();
    registry.seed_from_records(&store.list(None));

    rocket::build()
        .manage(store)
        .manage(registry)
        .manage(EditabilityPolicy::from_env())
        .mount(
            "/",
            routes![
                // records
                records::save_one,
                records::get_all,
                records::delete,
                records::delete_all,
                records::export_csv,
                records::live_format,
                // leaderboard
                leaderboard::get_one,
                leaderboard::export_csv,
                // events
                events::get_all,
                events::save_one,
            ],
        )
}
