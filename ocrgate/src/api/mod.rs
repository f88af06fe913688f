pub mod handlers;
mod routes;
mod state;

pub use routes::{create_router, MULTIPART_OVERHEAD_BYTES};
pub use state::AppState;
