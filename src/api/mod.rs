// Request layer
// Wire contracts, handlers and routing, independent of any HTTP framework

pub mod schemas;
pub mod handlers;
pub mod router;

pub use handlers::ApiContext;
pub use router::{ApiError, ApiRequest, ApiResponse, Router};
