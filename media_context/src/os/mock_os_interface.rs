/// Mock OS interface for unit tests
///
/// Heap-backed resources, a recording OsInterface and a configurable GT
/// topology. No hardware is touched; every call is appended to `calls` so
/// tests can assert on ordering.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::config::ContextConfig;
use crate::context::{CmdBufMgr, GpuContextMgr};
use crate::error::{Error, Result};
use crate::os::{
    GpuContextCreateOptions, GpuContextHandle, GpuNode, GraphicsResource, GtSystemInfo,
    LegacyGpuContext, LockFlags, OsDeviceContext, OsInterface, ResourceDesc, ResourceId,
    Submission, SubmissionType, VirtualEngineState,
};
use crate::utils::lock;

// ============================================================================
// MockResource
// ============================================================================

pub struct MockResource {
    id: ResourceId,
    name: String,
    data: Vec<u8>,
    locked: bool,
    freed: Arc<AtomicUsize>,
}

impl GraphicsResource for MockResource {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn lock(&mut self, _flags: LockFlags) -> Result<()> {
        self.locked = true;
        Ok(())
    }

    fn unlock(&mut self) -> Result<()> {
        if !self.locked {
            return Err(Error::InvalidParameter("resource not locked".to_string()));
        }
        self.locked = false;
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn lock_addr(&self) -> Option<*mut u8> {
        if self.locked {
            Some(self.data.as_ptr() as *mut u8)
        } else {
            None
        }
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if !self.locked || end > self.data.len() {
            return Err(Error::InvalidParameter("bad mock write".to_string()));
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + out.len();
        if end > self.data.len() {
            return Err(Error::InvalidParameter("bad mock read".to_string()));
        }
        out.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn free(&mut self) {
        if !self.data.is_empty() {
            self.data = Vec::new();
            self.locked = false;
            self.freed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// MockDevice
// ============================================================================

pub struct MockDevice {
    next_id: AtomicU64,
    pub allocations: AtomicUsize,
    pub frees: Arc<AtomicUsize>,
    pub waits: AtomicUsize,
    pub fail_allocations: AtomicBool,
    pub gt: Mutex<GtSystemInfo>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            allocations: AtomicUsize::new(0),
            frees: Arc::new(AtomicUsize::new(0)),
            waits: AtomicUsize::new(0),
            fail_allocations: AtomicBool::new(false),
            gt: Mutex::new(GtSystemInfo::default()),
        }
    }

    pub fn live_allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst) - self.frees.load(Ordering::SeqCst)
    }
}

impl OsDeviceContext for MockDevice {
    fn allocate_resource(&self, desc: &ResourceDesc) -> Result<Box<dyn GraphicsResource>> {
        if self.fail_allocations.load(Ordering::SeqCst) || desc.size == 0 {
            return Err(Error::OutOfMemory);
        }
        self.allocations.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockResource {
            id: ResourceId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            name: desc.name.clone(),
            data: vec![0; desc.size as usize],
            locked: false,
            freed: Arc::clone(&self.frees),
        }))
    }

    fn wait_for_resource_idle(&self, _resource: ResourceId) -> Result<()> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn gt_system_info(&self) -> GtSystemInfo {
        *lock(&self.gt)
    }
}

// ============================================================================
// MockOsInterface
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSubmission {
    pub gpu_context: GpuContextHandle,
    pub node: GpuNode,
    pub command_buffer: ResourceId,
    pub used_bytes: u32,
    pub submission_type: SubmissionType,
    pub secondary_count: usize,
    pub allocation_count: usize,
    pub patch_count: usize,
    pub status_tag: u32,
}

#[derive(Default)]
pub struct MockOsState {
    pub calls: Vec<String>,
    pub bindings: FxHashMap<LegacyGpuContext, GpuContextHandle>,
    pub current: Option<LegacyGpuContext>,
    pub virtual_engine: Option<VirtualEngineState>,
    pub enc_context: Option<LegacyGpuContext>,
    pub pak_context: Option<LegacyGpuContext>,
    pub reset_count: usize,
    pub submissions: Vec<MockSubmission>,
    pub fail_exec: bool,
    pub fail_bind: bool,
}

pub struct MockOsInterface {
    pub device: Arc<MockDevice>,
    pub gpu_context_mgr: Arc<GpuContextMgr>,
    pub cmd_buf_mgr: Arc<CmdBufMgr>,
    pub state: Mutex<MockOsState>,
}

impl MockOsInterface {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let device = Arc::new(MockDevice::new());
        let shared: Arc<dyn OsDeviceContext> = device.clone();
        Self {
            gpu_context_mgr: Arc::new(GpuContextMgr::new(Arc::clone(&shared), config.clone())),
            cmd_buf_mgr: Arc::new(CmdBufMgr::new(shared, &config)),
            device,
            state: Mutex::new(MockOsState::default()),
        }
    }

    pub fn with_gt(gt: GtSystemInfo) -> Self {
        let os = Self::new();
        *lock(&os.device.gt) = gt;
        os
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn binding(&self, ctx: LegacyGpuContext) -> Option<GpuContextHandle> {
        lock(&self.state).bindings.get(&ctx).copied()
    }

    fn record(&self, call: String) {
        lock(&self.state).calls.push(call);
    }
}

impl OsInterface for MockOsInterface {
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
        self.record(format!("create_gpu_context({:?}, {:?})", ctx, node));
        let context = self
            .gpu_context_mgr
            .create_gpu_context(node, &self.cmd_buf_mgr, Some(ctx), options)?;
        Ok(context.handle())
    }

    fn destroy_gpu_context_by_handle(&self, handle: GpuContextHandle) -> Result<()> {
        self.record(format!("destroy_gpu_context_by_handle({})", handle));
        if self.gpu_context_mgr.destroy_gpu_context_by_handle(handle) {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!("unknown handle {}", handle)))
        }
    }

    fn set_gpu_context_from_handle(&self, ctx: LegacyGpuContext, handle: GpuContextHandle) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(format!("set_gpu_context_from_handle({:?}, {})", ctx, handle));
        if state.fail_bind {
            return Err(Error::BackendError("bind refused".to_string()));
        }
        state.bindings.insert(ctx, handle);
        state.current = Some(ctx);
        Ok(())
    }

    fn invalidate_gpu_context(&self, ctx: LegacyGpuContext, handle: GpuContextHandle) {
        let mut state = lock(&self.state);
        state.calls.push(format!("invalidate_gpu_context({:?}, {})", ctx, handle));
        if state.bindings.get(&ctx) == Some(&handle) {
            state.bindings.remove(&ctx);
            if state.current == Some(ctx) {
                state.current = None;
            }
        }
    }

    fn current_gpu_context(&self) -> Option<LegacyGpuContext> {
        lock(&self.state).current
    }

    fn current_gpu_context_handle(&self) -> Option<GpuContextHandle> {
        let state = lock(&self.state);
        state.current.and_then(|ctx| state.bindings.get(&ctx).copied())
    }

    fn set_virtual_engine_state(&self, ve: Option<VirtualEngineState>) {
        let mut state = lock(&self.state);
        state.calls.push("set_virtual_engine_state".to_string());
        state.virtual_engine = ve;
    }

    fn set_encode_enc_context(&self, ctx: LegacyGpuContext) {
        let mut state = lock(&self.state);
        state.calls.push(format!("set_encode_enc_context({:?})", ctx));
        state.enc_context = Some(ctx);
    }

    fn set_encode_pak_context(&self, ctx: LegacyGpuContext) {
        let mut state = lock(&self.state);
        state.calls.push(format!("set_encode_pak_context({:?})", ctx));
        state.pak_context = Some(ctx);
    }

    fn reset_os_states(&self) {
        let mut state = lock(&self.state);
        state.calls.push("reset_os_states".to_string());
        state.reset_count += 1;
    }

    fn exec(&self, submission: &Submission<'_>) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(format!("exec({})", submission.gpu_context));
        if state.fail_exec {
            return Err(Error::BackendError("GPU hang".to_string()));
        }
        state.submissions.push(MockSubmission {
            gpu_context: submission.gpu_context,
            node: submission.node,
            command_buffer: submission.command_buffer,
            used_bytes: submission.used_bytes,
            submission_type: submission.submission_type,
            secondary_count: submission.secondary_buffers.len(),
            allocation_count: submission.allocations.len(),
            patch_count: submission.patch_locations.len(),
            status_tag: submission.status_tag,
        });
        Ok(())
    }

    fn wait_for_all(&self) -> Result<()> {
        self.record("wait_for_all".to_string());
        Ok(())
    }
}
