pub mod errors;
pub mod id;

pub use errors::{ConfigError, DeliveryError, HubError, RegistrationError};
pub use id::ConnectionId;

pub type Result<T> = std::result::Result<T, HubError>;
