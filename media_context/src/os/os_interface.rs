/// OsInterface / OsDeviceContext traits - the narrow OS layer the context core consumes

use std::sync::Arc;
use crate::context::{CmdBufMgr, GpuContextMgr};
use crate::error::Result;
use crate::os::{
    GpuContextHandle, GpuNode, GraphicsResource, GtSystemInfo, LegacyGpuContext, ResourceDesc,
    ResourceId,
};

// ============================================================================
// GPU context creation options
// ============================================================================

/// Options a GPU context is created with
///
/// The first group mirrors the basic creation options every context takes; the
/// second group (`using_sfc` onward) is only meaningful for video contexts
/// and is filled in by the scalability state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuContextCreateOptions {
    /// Command buffer ring scale (1 = default ring)
    pub cmd_buffer_num_scale: u32,
    /// Render-always (RA) mode
    pub ra_mode: bool,
    /// Protected (PXP) mode
    pub protect_mode: bool,
    /// Node override; None lets the mapping decide
    pub gpu_node: Option<GpuNode>,
    /// SSEU slice count (0 = driver default)
    pub slice_count: u8,
    /// SSEU subslice count per slice
    pub sub_slice_count: u8,
    /// SSEU maximum EU count per subslice
    pub max_eu_per_sub_slice: u8,
    /// SSEU minimum EU count per subslice
    pub min_eu_per_sub_slice: u8,
    /// Context serves a real-time priority queue
    pub is_real_time_priority: bool,

    /// SFC output is used (decode)
    pub using_sfc: bool,
    /// Parallel submission lane (LRCA) count
    pub lrca_count: u8,
    /// Kernel-mediated load balancing across engine instances
    pub using_virtual_engine: bool,
    /// Explicit engine instances (debug override)
    pub engine_instances: Vec<u8>,
    /// Backend specific flags
    pub flags: u32,
}

impl Default for GpuContextCreateOptions {
    fn default() -> Self {
        Self {
            cmd_buffer_num_scale: 1,
            ra_mode: false,
            protect_mode: false,
            gpu_node: None,
            slice_count: 0,
            sub_slice_count: 0,
            max_eu_per_sub_slice: 0,
            min_eu_per_sub_slice: 0,
            is_real_time_priority: false,
            using_sfc: false,
            lrca_count: 0,
            using_virtual_engine: false,
            engine_instances: Vec::new(),
            flags: 0,
        }
    }
}

impl GpuContextCreateOptions {
    /// Parallel submission lanes; 0 and 1 both mean one lane
    pub fn lane_count(&self) -> u8 {
        self.lrca_count.max(1)
    }

    /// Whether a context created with `self` can run work that asks for `other`
    ///
    /// Lane count, SFC output, virtual engine and protected mode are fixed at
    /// creation; everything else is tunable on a live context.
    pub fn is_compatible_with(&self, other: &GpuContextCreateOptions) -> bool {
        self.lane_count() == other.lane_count()
            && self.using_sfc == other.using_sfc
            && self.using_virtual_engine == other.using_virtual_engine
            && self.protect_mode == other.protect_mode
    }
}

/// Virtual-engine state a scalability state exposes to the OS layer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VirtualEngineState {
    /// Whether submissions may be split across instances
    pub scalability_enabled: bool,
    /// Pipes in use for the current workload
    pub pipe_count: u8,
    /// Engine instances the hint points at
    pub engine_instances: Vec<u8>,
}

// ============================================================================
// Submission
// ============================================================================

/// How a command buffer participates in a multi-pipe submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionType {
    /// Ordinary single-engine submission
    SinglePipe,
    /// Primary buffer of a scalable submission
    MultiPipeMaster,
    /// Secondary buffer of a scalable submission
    MultiPipeSlave,
}

/// One relocation the OS layer applies before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchLocation {
    /// Index into the allocation list
    pub allocation_index: u32,
    /// Offset inside the target resource
    pub allocation_offset: u32,
    /// Offset inside the command buffer where the address is written
    pub patch_offset: u32,
    /// The GPU writes the target resource
    pub write: bool,
}

/// Everything the OS layer needs to execute one command buffer
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    /// Context the buffer belongs to
    pub gpu_context: GpuContextHandle,
    /// Engine class to dispatch to
    pub node: GpuNode,
    /// Primary command buffer resource
    pub command_buffer: ResourceId,
    /// Bytes of commands written
    pub used_bytes: u32,
    /// Single or multi-pipe submission
    pub submission_type: SubmissionType,
    /// Secondary command buffers submitted alongside
    pub secondary_buffers: Vec<ResourceId>,
    /// Registered resources
    pub allocations: &'a [ResourceId],
    /// Relocations to apply
    pub patch_locations: &'a [PatchLocation],
    /// Status tag the GPU writes on completion
    pub status_tag: u32,
    /// Context priority at submission time
    pub priority: i32,
}

// ============================================================================
// OS device context
// ============================================================================

/// Device-level OS services (one per opened device)
///
/// Owns resource allocation; GPU contexts, command buffers and the
/// CmdBufMgr all allocate through it.
pub trait OsDeviceContext: Send + Sync {
    /// Allocate a graphics resource
    ///
    /// # Errors
    ///
    /// OutOfMemory / NotEnoughBuffer when the request cannot be satisfied.
    fn allocate_resource(&self, desc: &ResourceDesc) -> Result<Box<dyn GraphicsResource>>;

    /// Block until the GPU no longer references `resource`
    fn wait_for_resource_idle(&self, resource: ResourceId) -> Result<()>;

    /// GT topology
    fn gt_system_info(&self) -> GtSystemInfo;
}

// ============================================================================
// OS interface
// ============================================================================

/// Stream-level OS services used by the media context
///
/// Selected once when the session is opened and shared as
/// `Arc<dyn OsInterface>`; every method takes `&self`.
pub trait OsInterface: Send + Sync {
    /// Device context backing this stream
    fn device(&self) -> Arc<dyn OsDeviceContext>;

    /// GT topology
    fn gt_system_info(&self) -> GtSystemInfo {
        self.device().gt_system_info()
    }

    /// GPU context manager of the device (legacy path)
    fn gpu_context_mgr(&self) -> Option<Arc<GpuContextMgr>>;

    /// Command buffer manager of the device (legacy path)
    fn cmd_buf_mgr(&self) -> Option<Arc<CmdBufMgr>>;

    /// Create a GPU context for `ctx` on `node` (modern path)
    fn create_gpu_context(
        &self,
        ctx: LegacyGpuContext,
        node: GpuNode,
        options: &GpuContextCreateOptions,
    ) -> Result<GpuContextHandle>;

    /// Destroy a GPU context by handle (modern path)
    fn destroy_gpu_context_by_handle(&self, handle: GpuContextHandle) -> Result<()>;

    /// Bind legacy identifier `ctx` to `handle` and make it current
    fn set_gpu_context_from_handle(&self, ctx: LegacyGpuContext, handle: GpuContextHandle) -> Result<()>;

    /// Drop the binding of `ctx` if it still points at `handle`
    fn invalidate_gpu_context(&self, ctx: LegacyGpuContext, handle: GpuContextHandle);

    /// Current legacy context
    fn current_gpu_context(&self) -> Option<LegacyGpuContext>;

    /// Handle the current legacy context is bound to
    fn current_gpu_context_handle(&self) -> Option<GpuContextHandle>;

    /// Publish the virtual-engine state of the context being switched to
    fn set_virtual_engine_state(&self, state: Option<VirtualEngineState>);

    /// Legacy encoder ENC context binding
    fn set_encode_enc_context(&self, ctx: LegacyGpuContext);

    /// Legacy encoder PAK context binding
    fn set_encode_pak_context(&self, ctx: LegacyGpuContext);

    /// Clear per-call transient state before command construction starts
    fn reset_os_states(&self);

    /// Hand a command buffer to the kernel driver
    fn exec(&self, submission: &Submission<'_>) -> Result<()>;

    /// Block until every submitted command buffer completed
    fn wait_for_all(&self) -> Result<()>;
}
