/// CommandBuffer - one GPU-visible batch buffer
///
/// A command buffer is a graphics resource mapped persistently for CPU
/// writes. It is either free in the CmdBufMgr pool or bound to exactly one
/// GPU context. `ready_to_use` turns false once the buffer is handed to the
/// kernel and back to true after the OS layer reports it idle.

use crate::error::Result;
use crate::os::{
    GpuContextHandle, GraphicsResource, LockFlags, OsDeviceContext, ResourceDesc, ResourceId,
    ResourceKind,
};
use crate::utils::align_up;
use crate::{mos_bail, mos_error, mos_trace};

/// Command buffer sizes are rounded up to this many bytes
pub const COMMAND_BUFFER_ALIGNMENT: u32 = 8;

pub struct CommandBuffer {
    resource: Option<Box<dyn GraphicsResource>>,
    size: u32,
    ready_to_use: bool,
    gpu_context: Option<GpuContextHandle>,
}

impl CommandBuffer {
    /// Create an unallocated command buffer
    pub fn new() -> Self {
        Self {
            resource: None,
            size: 0,
            ready_to_use: false,
            gpu_context: None,
        }
    }

    /// Allocate and map the backing resource
    ///
    /// `size` is rounded up to [`COMMAND_BUFFER_ALIGNMENT`]. On success the
    /// buffer is mapped for persistent writes and ready to use.
    ///
    /// # Errors
    ///
    /// - InvalidParameter if `size` is 0 or the buffer is already allocated
    /// - whatever the OS layer reports for the allocation or the lock
    pub fn allocate(&mut self, device: &dyn OsDeviceContext, size: u32) -> Result<()> {
        if size == 0 {
            mos_bail!("media::CommandBuffer", InvalidParameter,
                "command buffer size must be non-zero");
        }
        if self.resource.is_some() {
            mos_bail!("media::CommandBuffer", InvalidParameter,
                "command buffer already allocated ({} bytes), use resize", self.size);
        }

        let aligned = align_up(size, COMMAND_BUFFER_ALIGNMENT);
        let mut resource = device.allocate_resource(&ResourceDesc::buffer(
            "MediaCommandBuffer",
            aligned as u64,
            ResourceKind::CommandBuffer,
        ))?;

        if let Err(e) = resource.lock(LockFlags::WRITE | LockFlags::PERSISTENT) {
            mos_error!("media::CommandBuffer", "Failed to map command buffer: {}", e);
            resource.free();
            return Err(e);
        }

        mos_trace!("media::CommandBuffer", "Allocated command buffer {:?} ({} bytes)",
            resource.id(), aligned);

        self.resource = Some(resource);
        self.size = aligned;
        self.ready_to_use = true;
        Ok(())
    }

    /// Unmap and release the backing resource
    ///
    /// No-op on an unallocated buffer.
    pub fn free(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            if resource.is_locked() {
                if let Err(e) = resource.unlock() {
                    mos_error!("media::CommandBuffer", "Failed to unmap command buffer {:?}: {}",
                        resource.id(), e);
                }
            }
            resource.free();
        }
        self.size = 0;
        self.ready_to_use = false;
    }

    /// Attach this buffer to a GPU context
    ///
    /// # Errors
    ///
    /// InvalidParameter if the buffer is already bound.
    pub fn bind_to_gpu_context(&mut self, handle: GpuContextHandle) -> Result<()> {
        if let Some(bound) = self.gpu_context {
            mos_bail!("media::CommandBuffer", InvalidParameter,
                "command buffer already bound to GPU context {} (binding {})", bound, handle);
        }
        self.gpu_context = Some(handle);
        Ok(())
    }

    /// Detach this buffer from its GPU context
    pub fn unbind_to_gpu_context(&mut self) {
        self.gpu_context = None;
    }

    /// Grow the buffer to at least `new_size` bytes
    ///
    /// Smaller or equal requests are a no-op. The old contents are not
    /// preserved; if the new allocation fails the old buffer stays intact.
    pub fn resize(&mut self, device: &dyn OsDeviceContext, new_size: u32) -> Result<()> {
        if self.resource.is_some() && new_size <= self.size {
            return Ok(());
        }

        let mut replacement = CommandBuffer::new();
        replacement.allocate(device, new_size)?;

        self.free();
        self.resource = replacement.resource.take();
        self.size = replacement.size;
        self.ready_to_use = true;
        Ok(())
    }

    /// Block until the GPU no longer uses this buffer
    pub fn wait_ready(&mut self, device: &dyn OsDeviceContext) -> Result<()> {
        if self.ready_to_use {
            return Ok(());
        }
        if let Some(resource) = &self.resource {
            device.wait_for_resource_idle(resource.id())?;
        }
        self.ready_to_use = true;
        Ok(())
    }

    pub(crate) fn set_ready_to_use(&mut self, ready: bool) {
        self.ready_to_use = ready;
    }

    /// Copy `data` into the buffer at `offset`
    pub(crate) fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        match self.resource.as_mut() {
            Some(resource) => resource.write(offset as u64, data),
            None => mos_bail!("media::CommandBuffer", NullPointer,
                "write to unallocated command buffer"),
        }
    }

    /// Zero the whole buffer before it is handed out again
    pub(crate) fn clear_contents(&mut self) -> Result<()> {
        let size = self.size as usize;
        match self.resource.as_mut() {
            Some(resource) => resource.write(0, &vec![0u8; size]),
            None => Ok(()),
        }
    }

    /// Copy from the buffer at `offset` into `out`
    pub fn read(&self, offset: u32, out: &mut [u8]) -> Result<()> {
        match self.resource.as_ref() {
            Some(resource) => resource.read(offset as u64, out),
            None => mos_bail!("media::CommandBuffer", NullPointer,
                "read from unallocated command buffer"),
        }
    }

    // ===== ACCESSORS =====

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_allocated(&self) -> bool {
        self.resource.is_some()
    }

    pub fn is_ready_to_use(&self) -> bool {
        self.ready_to_use
    }

    /// GPU context this buffer is bound to
    pub fn gpu_context(&self) -> Option<GpuContextHandle> {
        self.gpu_context
    }

    pub fn resource(&self) -> Option<&dyn GraphicsResource> {
        self.resource.as_deref()
    }

    pub fn resource_id(&self) -> Option<ResourceId> {
        self.resource.as_ref().map(|r| r.id())
    }

    /// CPU address of the mapping
    pub fn lock_addr(&self) -> Option<*mut u8> {
        self.resource.as_ref().and_then(|r| r.lock_addr())
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
