mod control;
mod device;
mod stream;

pub use control::ptz;
pub use device::{list_channels, list_devices, query_device_info, query_device_status, refresh_catalog};
pub use stream::{start_stream, stop_stream};
