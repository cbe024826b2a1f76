pub mod leaderboard;
pub mod policy;
pub mod store;
pub mod time_codec;

pub mod models {
    pub mod event;
    pub mod record;
}

pub mod helpers {
    pub mod logging;
}
