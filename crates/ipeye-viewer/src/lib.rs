pub mod catalog;
pub mod config;
pub mod context;
pub mod enrich;
pub mod logging;
pub mod menu;
pub mod server;

mod error;

pub use error::{Error, Result};

#[cfg(test)]
pub(crate) mod testing;
