pub mod env;
pub mod error;
pub mod params;

pub use env::EnvManager;
pub use error::ConfigError;
pub use params::ConnectionParams;
