pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod fallback;
pub mod realtime;
pub mod responses;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod upstream;

pub use state::AppState;
