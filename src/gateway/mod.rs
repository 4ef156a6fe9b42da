//! Gateway server implementation

pub mod auth;
mod router;
mod server;

pub use auth::auth_middleware;
pub use router::{AppState, ChatRequest, ChatResponse, SERVICE_NAME, cors_layer, create_router};
pub use server::Gateway;
