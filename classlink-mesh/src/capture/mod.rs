mod capture_device;
mod capture_source;
mod local_track;
mod synthetic_device;

pub use capture_device::*;
pub use capture_source::*;
pub use local_track::*;
pub use synthetic_device::*;
