pub mod auth;
pub mod claims;
pub mod config;
pub mod db;
mod error;
pub mod items;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod rate_limit;
pub mod routes;
pub mod search;
pub mod state;
pub mod time;
pub mod uploads;

pub use error::{AppError, AppResult};
pub use routes::router;
pub use state::AppState;
