pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub mod prelude {
    pub use crate::config::OrchestratorConfig;
    pub use crate::errors::OrchestratorError;
    pub use crate::state::{AppState, SystemMode};
}
