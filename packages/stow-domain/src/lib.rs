pub mod prune;
pub mod query;
pub mod scope;
pub mod score;

mod error;

pub use error::{Error, Result};
