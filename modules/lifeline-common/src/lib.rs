pub mod config;
pub mod error;
pub mod geo;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use error::LifelineError;
pub use geo::*;
pub use types::*;
