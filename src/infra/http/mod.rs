//! HTTP surface of the gateway.

mod error;
mod middleware;
mod public;

pub use error::{GENERATION_FAILED_MESSAGE, RATE_LIMITED_MESSAGE, generate_error_to_response};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use public::{HttpState, build_router};
