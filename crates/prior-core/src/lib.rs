pub mod claim;
pub mod config;
pub mod error;
pub mod types;

pub use error::{PriorError, PriorResult};
