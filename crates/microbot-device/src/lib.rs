pub mod collection;
pub mod error;
pub mod event;
pub mod model;

pub use collection::{DeviceCollection, DeviceHandle, MergeReport};
pub use error::{DeviceError, Result};
pub use event::{CollectionEvent, EventBus};
pub use model::{Calibration, ConnectionStatus, Device, DeviceId};
