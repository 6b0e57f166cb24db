pub mod access;
pub mod ratings;
pub mod reviews;
pub mod throttle;

pub use access::{authorize, Operation, Permission};
pub use throttle::{Rate, Scope, Throttle, ThrottleRates};
