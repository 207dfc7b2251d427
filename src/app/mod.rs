//! Application state the conversation session reports into

mod host;
mod store;

pub use host::{Screen, SessionHost};
pub use store::{AppState, AppStore};
