/// GpuContextBackend - how a media context creates and destroys GPU contexts
///
/// Chosen once when the media context is built. The handle backend goes
/// through the OS interface; the legacy backend talks to the device's
/// GpuContextMgr directly.

use std::sync::Arc;
use crate::context::{CmdBufMgr, GpuContextMgr};
use crate::error::Result;
use crate::os::{GpuContextCreateOptions, GpuContextHandle, GpuNode, LegacyGpuContext, OsInterface};
use crate::{mos_bail, mos_err};

pub trait GpuContextBackend: Send + Sync {
    /// Create a context for legacy identifier `ctx` on `node`
    fn create_gpu_context(
        &self,
        os: &dyn OsInterface,
        ctx: LegacyGpuContext,
        node: GpuNode,
        options: &GpuContextCreateOptions,
    ) -> Result<GpuContextHandle>;

    /// Destroy the context at `handle`
    fn destroy_gpu_context(&self, os: &dyn OsInterface, handle: GpuContextHandle) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Handle-based create/destroy through the OS interface
#[derive(Debug, Default, Clone, Copy)]
pub struct HandleContextBackend;

impl GpuContextBackend for HandleContextBackend {
    fn create_gpu_context(
        &self,
        os: &dyn OsInterface,
        ctx: LegacyGpuContext,
        node: GpuNode,
        options: &GpuContextCreateOptions,
    ) -> Result<GpuContextHandle> {
        os.create_gpu_context(ctx, node, options)
    }

    fn destroy_gpu_context(&self, os: &dyn OsInterface, handle: GpuContextHandle) -> Result<()> {
        os.destroy_gpu_context_by_handle(handle)
    }

    fn name(&self) -> &'static str {
        "handle"
    }
}

/// Create/destroy through the device's GpuContextMgr
pub struct LegacyContextBackend {
    gpu_context_mgr: Arc<GpuContextMgr>,
    cmd_buf_mgr: Arc<CmdBufMgr>,
}

impl LegacyContextBackend {
    pub fn new(gpu_context_mgr: Arc<GpuContextMgr>, cmd_buf_mgr: Arc<CmdBufMgr>) -> Self {
        Self {
            gpu_context_mgr,
            cmd_buf_mgr,
        }
    }

    /// Use the managers the OS interface exposes
    ///
    /// # Errors
    ///
    /// NullPointer if the OS interface has no GpuContextMgr or CmdBufMgr.
    pub fn from_os(os: &dyn OsInterface) -> Result<Self> {
        let gpu_context_mgr = os.gpu_context_mgr().ok_or_else(|| mos_err!(
            "media::LegacyContextBackend", NullPointer, "OS interface has no GpuContextMgr"))?;
        let cmd_buf_mgr = os.cmd_buf_mgr().ok_or_else(|| mos_err!(
            "media::LegacyContextBackend", NullPointer, "OS interface has no CmdBufMgr"))?;
        Ok(Self::new(gpu_context_mgr, cmd_buf_mgr))
    }

    pub fn gpu_context_mgr(&self) -> &Arc<GpuContextMgr> {
        &self.gpu_context_mgr
    }
}

impl GpuContextBackend for LegacyContextBackend {
    fn create_gpu_context(
        &self,
        _os: &dyn OsInterface,
        ctx: LegacyGpuContext,
        node: GpuNode,
        options: &GpuContextCreateOptions,
    ) -> Result<GpuContextHandle> {
        let context = self
            .gpu_context_mgr
            .create_gpu_context(node, &self.cmd_buf_mgr, Some(ctx), options)?;
        Ok(context.handle())
    }

    fn destroy_gpu_context(&self, _os: &dyn OsInterface, handle: GpuContextHandle) -> Result<()> {
        let Some(context) = self.gpu_context_mgr.get_gpu_context(handle) else {
            mos_bail!("media::LegacyContextBackend", Unknown,
                "GPU context {} is already gone", handle);
        };
        if !self.gpu_context_mgr.destroy_gpu_context(&context) {
            mos_bail!("media::LegacyContextBackend", Unknown,
                "GPU context {} could not be destroyed", handle);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "legacy"
    }
}

#[cfg(test)]
#[path = "context_backend_tests.rs"]
mod tests;
