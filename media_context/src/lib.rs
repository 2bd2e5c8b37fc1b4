/*!
# Media Context

GPU execution-context management for a media driver.

This crate decides, for every unit of media work, which hardware engine it
runs on, whether an existing GPU context can be reused for it, and how the
command buffers bound to that context are pooled and grown. The OS layer is
reached through traits; `media_context_null` provides a host-memory backend.

## Architecture

- **CommandBuffer / CmdBufMgr**: batch buffers and the device-wide pool they come from
- **GpuContext**: one hardware context with its command buffer ring
- **GpuContextMgr**: handle-indexed arena of GPU contexts
- **MediaContext**: per-session façade mapping (function, scalability) to a context
- **MediaScalability / ScalabilityFactory**: how a workload is split over engines
- **OsInterface / OsDeviceContext / GraphicsResource**: the OS layer consumed by the core
*/

// Internal modules
mod error;
mod driver;
mod config;
pub mod log;
pub mod os;
pub mod context;
pub mod scalability;
pub(crate) mod utils;

// Main media namespace module
pub mod media {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging dispatch
    pub use crate::driver::Driver;

    // Configuration
    pub use crate::config::*;

    // Façade
    pub use crate::context::{MediaContext, MediaFunction, SwitchedContext};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // OS layer traits and types
    pub mod os {
        pub use crate::os::*;
    }

    // Contexts, command buffers and mappings
    pub mod context {
        pub use crate::context::*;
    }

    // Scalability states and factory
    pub mod scalability {
        pub use crate::scalability::*;
    }
}
