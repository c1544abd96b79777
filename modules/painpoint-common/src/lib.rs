pub mod config;
pub mod error;
pub mod types;

pub use config::{FileConfig, Provider, Secrets};
pub use error::{ClassifyError, PainpointError};
pub use types::*;
