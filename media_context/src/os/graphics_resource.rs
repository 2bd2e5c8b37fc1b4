/// GraphicsResource trait and resource descriptors

use bitflags::bitflags;
use crate::error::Result;

/// Process-unique identifier of a graphics resource
///
/// Used by the allocation list to de-duplicate registrations and by the OS
/// layer to find the buffer object behind a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// Kind of graphics resource requested from the OS layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Batch buffer holding hardware commands
    CommandBuffer,
    /// Small buffer the GPU writes completion tags into
    StatusBuffer,
    /// Any other linear buffer
    Buffer,
}

/// Descriptor for allocating a graphics resource
#[derive(Debug, Clone)]
pub struct ResourceDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Resource kind
    pub kind: ResourceKind,
}

impl ResourceDesc {
    /// Linear buffer descriptor
    pub fn buffer(name: &str, size: u64, kind: ResourceKind) -> Self {
        Self {
            name: name.to_string(),
            size,
            kind,
        }
    }
}

bitflags! {
    /// CPU access requested when locking a resource
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LockFlags: u32 {
        /// CPU reads
        const READ = 1 << 0;
        /// CPU writes
        const WRITE = 1 << 1;
        /// Caller guarantees the GPU is not using the range being written
        const NO_OVERWRITE = 1 << 2;
        /// Keep the mapping for the resource lifetime
        const PERSISTENT = 1 << 3;
    }
}

/// Graphics memory resource trait
///
/// Implemented by the OS backend (a GEM buffer object on real hardware, a
/// heap allocation for the null backend). The resource is released either by
/// [`GraphicsResource::free`] or when dropped.
pub trait GraphicsResource: Send + Sync {
    /// Unique identifier
    fn id(&self) -> ResourceId;

    /// Size in bytes
    fn size(&self) -> u64;

    /// Debug name
    fn name(&self) -> &str;

    /// Map the resource for CPU access
    fn lock(&mut self, flags: LockFlags) -> Result<()>;

    /// Unmap the resource
    fn unlock(&mut self) -> Result<()>;

    /// Whether the resource is currently mapped
    fn is_locked(&self) -> bool;

    /// CPU address of the mapping
    ///
    /// Returns None while the resource is not locked. The pointer is only
    /// valid until the next unlock/free.
    fn lock_addr(&self) -> Option<*mut u8>;

    /// Copy `data` into the mapped resource at `offset`
    ///
    /// Fails if the resource is not locked or the range overflows it.
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Copy from the mapped resource at `offset` into `out`
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()>;

    /// Release the backing memory; further access fails
    fn free(&mut self);
}
