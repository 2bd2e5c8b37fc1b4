/// Scalability module - how a workload is spread over engine instances

pub mod media_scalability;
pub mod scalability_single_pipe;
pub mod scalability_multi_pipe;
pub mod scalability_factory;

pub use media_scalability::*;
pub use scalability_single_pipe::MediaScalabilitySinglePipe;
pub use scalability_multi_pipe::{MediaScalabilityMultiPipe, CREATE_FLAG_VDENC};
pub use scalability_factory::DefaultScalabilityFactory;

#[cfg(test)]
#[path = "scalability_tests.rs"]
mod tests;
