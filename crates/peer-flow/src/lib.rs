pub mod ingestor;
pub mod monitor;
pub mod notifier;
pub mod processor;
pub mod report;
pub mod resolver;
pub mod settings;
pub mod types;

mod error;

pub use error::{Error, Result};
