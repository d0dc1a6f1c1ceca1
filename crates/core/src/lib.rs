pub mod config;
pub mod error;
pub mod filter;
pub mod model;

pub use error::{RelayError, Result};
