pub mod global;
pub mod loader;
pub mod logging;

pub use global::{ActionSettings, ApiConfig, ControllerConfig, LoggingConfig, PollerSettings};
pub use loader::ConfigLoader;
pub use logging::init_logging;
