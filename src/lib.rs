pub mod api;
pub mod bandit;
pub mod db;
pub mod environment;
pub mod logging;
pub mod ranking;

pub const TARGET_API: &str = "api_request";
pub const TARGET_RANKING: &str = "ranking";
pub const TARGET_BANDIT: &str = "bandit";
pub const TARGET_DB: &str = "db_query";
