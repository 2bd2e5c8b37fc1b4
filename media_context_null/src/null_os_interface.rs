/// NullOsInterface - OsInterface over a NullDevice
///
/// Owns the device-wide GpuContextMgr and CmdBufMgr, keeps the legacy
/// context bindings and records every submission. Submissions complete as
/// soon as they are executed.

use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use media_context::media::{ContextConfig, Result};
use media_context::media::context::{CmdBufMgr, GpuContextMgr};
use media_context::media::os::{
    GpuContextCreateOptions, GpuContextHandle, GpuNode, GtSystemInfo, LegacyGpuContext,
    OsDeviceContext, OsInterface, ResourceId, Submission, SubmissionType, VirtualEngineState,
};
use media_context::{mos_bail, mos_debug, mos_warn};
use crate::null_device::NullDevice;

/// Submission as seen by the null backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub gpu_context: GpuContextHandle,
    pub node: GpuNode,
    pub command_buffer: ResourceId,
    pub used_bytes: u32,
    pub submission_type: SubmissionType,
    pub secondary_buffers: Vec<ResourceId>,
    pub allocation_count: usize,
    pub patch_count: usize,
    pub status_tag: u32,
    pub priority: i32,
}

#[derive(Default)]
struct NullOsState {
    bindings: FxHashMap<LegacyGpuContext, GpuContextHandle>,
    current: Option<LegacyGpuContext>,
    virtual_engine: Option<VirtualEngineState>,
    enc_context: Option<LegacyGpuContext>,
    pak_context: Option<LegacyGpuContext>,
    reset_count: u64,
    submissions: Vec<SubmissionRecord>,
}

pub struct NullOsInterface {
    device: Arc<NullDevice>,
    gpu_context_mgr: Arc<GpuContextMgr>,
    cmd_buf_mgr: Arc<CmdBufMgr>,
    state: Mutex<NullOsState>,
}

impl NullOsInterface {
    /// Null interface with the default topology and configuration
    pub fn new() -> Result<Self> {
        Self::with_device(Arc::new(NullDevice::default()), ContextConfig::default())
    }

    /// Null interface reporting `gt`
    pub fn with_gt(gt: GtSystemInfo, config: ContextConfig) -> Result<Self> {
        Self::with_device(Arc::new(NullDevice::new(gt)), config)
    }

    /// Null interface over an existing device
    ///
    /// The command buffer pool is pre-filled with
    /// `config.initial_command_buffers` buffers.
    ///
    /// # Errors
    ///
    /// InvalidParameter if `config` does not validate, or whatever the
    /// initial pool allocation reports.
    pub fn with_device(device: Arc<NullDevice>, config: ContextConfig) -> Result<Self> {
        config.validate()?;
        let shared: Arc<dyn OsDeviceContext> = device.clone();
        let cmd_buf_mgr = Arc::new(CmdBufMgr::new(Arc::clone(&shared), &config));
        cmd_buf_mgr.initialize(config.command_buffer_size, config.initial_command_buffers)?;
        let gpu_context_mgr = Arc::new(GpuContextMgr::new(shared, config));

        Ok(Self {
            device,
            gpu_context_mgr,
            cmd_buf_mgr,
            state: Mutex::new(NullOsState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, NullOsState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn null_device(&self) -> &Arc<NullDevice> {
        &self.device
    }

    /// Handle bound to legacy context `ctx`
    pub fn binding(&self, ctx: LegacyGpuContext) -> Option<GpuContextHandle> {
        self.state().bindings.get(&ctx).copied()
    }

    /// Last published virtual-engine state
    pub fn virtual_engine_state(&self) -> Option<VirtualEngineState> {
        self.state().virtual_engine.clone()
    }

    pub fn enc_context(&self) -> Option<LegacyGpuContext> {
        self.state().enc_context
    }

    pub fn pak_context(&self) -> Option<LegacyGpuContext> {
        self.state().pak_context
    }

    /// Times per-call OS state was reset
    pub fn reset_count(&self) -> u64 {
        self.state().reset_count
    }

    /// Every submission executed so far, oldest first
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.state().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state().submissions.len()
    }
}

impl OsInterface for NullOsInterface {
    fn device(&self) -> Arc<dyn OsDeviceContext> {
        self.device.clone()
    }

    fn gpu_context_mgr(&self) -> Option<Arc<GpuContextMgr>> {
        Some(Arc::clone(&self.gpu_context_mgr))
    }

    fn cmd_buf_mgr(&self) -> Option<Arc<CmdBufMgr>> {
        Some(Arc::clone(&self.cmd_buf_mgr))
    }

    fn create_gpu_context(
        &self,
        ctx: LegacyGpuContext,
        node: GpuNode,
        options: &GpuContextCreateOptions,
    ) -> Result<GpuContextHandle> {
        let context = self
            .gpu_context_mgr
            .create_gpu_context(node, &self.cmd_buf_mgr, Some(ctx), options)?;
        Ok(context.handle())
    }

    fn destroy_gpu_context_by_handle(&self, handle: GpuContextHandle) -> Result<()> {
        if !self.gpu_context_mgr.destroy_gpu_context_by_handle(handle) {
            mos_bail!("media::NullOsInterface", InvalidParameter,
                "GPU context {} is not live", handle);
        }
        Ok(())
    }

    fn set_gpu_context_from_handle(&self, ctx: LegacyGpuContext, handle: GpuContextHandle) -> Result<()> {
        if self.gpu_context_mgr.get_gpu_context(handle).is_none() {
            mos_bail!("media::NullOsInterface", InvalidParameter,
                "cannot bind {:?} to dead GPU context {}", ctx, handle);
        }
        let mut state = self.state();
        state.bindings.insert(ctx, handle);
        state.current = Some(ctx);
        Ok(())
    }

    fn invalidate_gpu_context(&self, ctx: LegacyGpuContext, handle: GpuContextHandle) {
        let mut state = self.state();
        if state.bindings.get(&ctx) != Some(&handle) {
            return;
        }
        state.bindings.remove(&ctx);
        if state.current == Some(ctx) {
            state.current = None;
        }
    }

    fn current_gpu_context(&self) -> Option<LegacyGpuContext> {
        self.state().current
    }

    fn current_gpu_context_handle(&self) -> Option<GpuContextHandle> {
        let state = self.state();
        state.current.and_then(|ctx| state.bindings.get(&ctx).copied())
    }

    fn set_virtual_engine_state(&self, ve: Option<VirtualEngineState>) {
        self.state().virtual_engine = ve;
    }

    fn set_encode_enc_context(&self, ctx: LegacyGpuContext) {
        self.state().enc_context = Some(ctx);
    }

    fn set_encode_pak_context(&self, ctx: LegacyGpuContext) {
        self.state().pak_context = Some(ctx);
    }

    fn reset_os_states(&self) {
        self.state().reset_count += 1;
    }

    fn exec(&self, submission: &Submission<'_>) -> Result<()> {
        if submission.used_bytes == 0 {
            mos_warn!("media::NullOsInterface", "Empty command buffer submitted on {}",
                submission.gpu_context);
        }

        #[cfg(feature = "submission-trace")]
        media_context::mos_trace!("media::NullOsInterface",
            "exec {} on {:?}: {} bytes, {:?}, {} allocations, {} patches, tag {}",
            submission.gpu_context, submission.node, submission.used_bytes,
            submission.submission_type, submission.allocations.len(),
            submission.patch_locations.len(), submission.status_tag);

        self.device.record_submission();
        self.state().submissions.push(SubmissionRecord {
            gpu_context: submission.gpu_context,
            node: submission.node,
            command_buffer: submission.command_buffer,
            used_bytes: submission.used_bytes,
            submission_type: submission.submission_type,
            secondary_buffers: submission.secondary_buffers.clone(),
            allocation_count: submission.allocations.len(),
            patch_count: submission.patch_locations.len(),
            status_tag: submission.status_tag,
            priority: submission.priority,
        });
        Ok(())
    }

    fn wait_for_all(&self) -> Result<()> {
        mos_debug!("media::NullOsInterface", "wait_for_all: {} submissions already complete",
            self.submission_count());
        Ok(())
    }
}

impl Drop for NullOsInterface {
    fn drop(&mut self) {
        self.gpu_context_mgr.destroy_all_gpu_contexts();
        self.cmd_buf_mgr.clean_up();
    }
}
