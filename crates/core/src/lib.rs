pub mod config;
pub mod domain;
pub mod errors;

pub use domain::authorization::{derive_record_key, AuthorizationRecord, TeamId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
