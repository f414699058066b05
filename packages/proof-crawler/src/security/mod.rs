//! Secret handling for login credentials and API tokens.

pub mod credentials;

pub use credentials::{Credentials, SecretString};
