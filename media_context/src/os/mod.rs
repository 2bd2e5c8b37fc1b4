/// OS abstraction module - the traits the context core is written against

pub mod gpu_node;
pub mod graphics_resource;
pub mod os_interface;

pub use gpu_node::*;
pub use graphics_resource::*;
pub use os_interface::*;

// Mock OS interface for tests (no device required)
#[cfg(test)]
pub mod mock_os_interface;
