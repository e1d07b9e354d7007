pub mod rate_limit;
pub mod validation;

pub use rate_limit::{throttle_middleware, RequestThrottle};
pub use validation::validate_json;
