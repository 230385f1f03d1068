//! # Muster Core
//! Shared foundation for MusterBot: the error type, bootstrap config,
//! domain/wire types, and the `Transport` trait that the Signal channel
//! (and test mocks) implement.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::MusterConfig;
pub use error::{MusterError, Result};
pub use traits::Transport;
