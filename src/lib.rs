pub mod aggregate;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod output;
pub mod search;

pub use error::{Error, Result};
