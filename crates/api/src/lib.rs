pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiErrorResponse};
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
