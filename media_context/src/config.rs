/// Context configuration - sizes and bounds used by the context layer

use crate::error::Result;
use crate::mos_bail;

/// Default size in bytes of one command buffer
pub const COMMAND_BUFFER_SIZE: u32 = 32768;

/// Number of command buffers a GPU context cycles through
pub const MAX_CMD_BUF_NUM: usize = 30;

/// Default capacity of the patch-location list
pub const PATCH_LOCATION_LIST_SIZE: u32 = 512;

/// Capacity of the allocation (resource registration) list
pub const ALLOCATION_LIST_SIZE: u32 = 512;

/// Maximum rows in a MediaContext attribute table
pub const MAX_GPU_CONTEXT_ATTRIBUTE_TABLE_SIZE: usize = 4096;

/// Live GPU contexts per manager before the reuse policy kicks in
pub const MAX_GPU_CONTEXTS: u32 = 64;

/// Upper bound on command buffers owned by one CmdBufMgr
pub const MAX_COMMAND_BUFFERS: u32 = 1024;

/// Context layer configuration
///
/// Every component takes its bounds from here instead of hard-coding them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Initial command buffer size in bytes (8-byte aligned on use)
    pub command_buffer_size: u32,
    /// Ring size of command buffers per GPU context
    pub max_cmd_buf_num: usize,
    /// Initial patch-location list capacity
    pub patch_list_size: u32,
    /// Allocation list capacity
    pub allocation_list_size: u32,
    /// MediaContext attribute table bound
    pub max_attribute_table_size: usize,
    /// Live contexts before reuse is needed
    pub max_gpu_contexts: u32,
    /// Command buffers one CmdBufMgr may own
    pub max_command_buffers: u32,
    /// Command buffers pre-allocated by CmdBufMgr::initialize
    pub initial_command_buffers: u32,
    /// GPU status buffer size in bytes
    pub status_buffer_size: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: COMMAND_BUFFER_SIZE,
            max_cmd_buf_num: MAX_CMD_BUF_NUM,
            patch_list_size: PATCH_LOCATION_LIST_SIZE,
            allocation_list_size: ALLOCATION_LIST_SIZE,
            max_attribute_table_size: MAX_GPU_CONTEXT_ATTRIBUTE_TABLE_SIZE,
            max_gpu_contexts: MAX_GPU_CONTEXTS,
            max_command_buffers: MAX_COMMAND_BUFFERS,
            initial_command_buffers: 1,
            status_buffer_size: 64,
        }
    }
}

impl ContextConfig {
    /// Reject configurations that would make a pool or table unusable
    pub fn validate(&self) -> Result<()> {
        if self.command_buffer_size == 0 {
            mos_bail!("media::ContextConfig", InvalidParameter,
                "command_buffer_size must be non-zero");
        }
        if self.max_cmd_buf_num == 0 {
            mos_bail!("media::ContextConfig", InvalidParameter,
                "max_cmd_buf_num must be non-zero");
        }
        if self.max_attribute_table_size == 0 {
            mos_bail!("media::ContextConfig", InvalidParameter,
                "max_attribute_table_size must be non-zero");
        }
        if self.max_gpu_contexts == 0 || self.max_command_buffers == 0 {
            mos_bail!("media::ContextConfig", InvalidParameter,
                "max_gpu_contexts and max_command_buffers must be non-zero");
        }
        if self.initial_command_buffers > self.max_command_buffers {
            mos_bail!("media::ContextConfig", InvalidParameter,
                "initial_command_buffers ({}) exceeds max_command_buffers ({})",
                self.initial_command_buffers, self.max_command_buffers);
        }
        if self.status_buffer_size < 8 {
            mos_bail!("media::ContextConfig", InvalidParameter,
                "status_buffer_size must hold at least a status tag (8 bytes)");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
