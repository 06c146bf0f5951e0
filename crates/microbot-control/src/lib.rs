pub mod actions;
pub mod api;
pub mod calibration;
pub mod dispatcher;
pub mod endpoint;
pub mod error;

pub use actions::{public_actions, ActionFilter, HIDDEN_ACTIONS};
pub use api::http::HttpMicrobotApi;
#[cfg(any(test, feature = "mock"))]
pub use api::mock::{MockMicrobotApi, RecordedCall};
pub use api::{MicrobotApi, SaveMethod};
pub use calibration::{parse_calibration, parse_float_prefix, CALIBRATION_MAX, CALIBRATION_MIN};
pub use dispatcher::{ActionDispatcher, CalibrationUpdate};
pub use endpoint::{action_url, ApiEndpoint, Origin};
pub use error::{ControlError, Result};
