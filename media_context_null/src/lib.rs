/*!
# Media Context - Null Backend

Host-memory implementation of the media context OS layer.

This crate implements `OsDeviceContext`, `GraphicsResource` and `OsInterface`
without touching a GPU: resources are heap allocations, submissions complete
immediately and are recorded for inspection. It is the backend the
integration tests and headless tools run the context core against.
*/

mod null_resource;
mod null_device;
mod null_os_interface;
mod stats;

pub use null_resource::NullResource;
pub use null_device::NullDevice;
pub use null_os_interface::{NullOsInterface, SubmissionRecord};
pub use stats::{NullStats, print_null_stats_report};
