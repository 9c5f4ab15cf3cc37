mod app;
mod config;
mod transport;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use transport::{ErrorStage, TransportError};
pub use validation::ValidationError;
