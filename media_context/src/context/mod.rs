/// Context module - command buffers, GPU contexts and the media context façade

pub mod command_buffer;
pub mod cmd_buf_mgr;
pub mod gpu_context;
pub mod gpu_context_mgr;
pub mod media_function;
pub mod context_backend;
pub mod media_context;

pub use command_buffer::{CommandBuffer, COMMAND_BUFFER_ALIGNMENT};
pub use cmd_buf_mgr::{CmdBufMgr, CommandBufferKey, SharedCommandBuffer};
pub use gpu_context::{CommandBufferView, GpuContext};
pub use gpu_context_mgr::GpuContextMgr;
pub use media_function::{
    function_to_gpu_context, function_to_gpu_context_decode, function_to_gpu_context_encode,
    function_to_node, function_to_node_decode, MediaFunction,
};
pub use context_backend::{GpuContextBackend, HandleContextBackend, LegacyContextBackend};
pub use media_context::{GpuContextAttribute, MediaContext, SwitchedContext};
