pub mod errors;

pub mod modules;
pub mod routes {
    pub mod events;
    pub mod leaderboard;
    pub mod records;
}
