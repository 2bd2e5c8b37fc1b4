/// NullResource - heap-backed GraphicsResource

use std::sync::Arc;
use media_context::media::Error;
use media_context::media::Result;
use media_context::media::os::{GraphicsResource, LockFlags, ResourceDesc, ResourceId, ResourceKind};
use crate::stats::StatsTracker;

/// Graphics resource living in host memory
///
/// The allocation is released by [`GraphicsResource::free`] or on drop,
/// whichever comes first; the device statistics see exactly one free.
pub struct NullResource {
    id: ResourceId,
    name: String,
    kind: ResourceKind,
    data: Vec<u8>,
    lock_flags: Option<LockFlags>,
    freed: bool,
    stats: Arc<StatsTracker>,
}

impl NullResource {
    pub(crate) fn new(id: ResourceId, desc: &ResourceDesc, stats: Arc<StatsTracker>) -> Self {
        stats.record_allocation(desc.size);
        Self {
            id,
            name: desc.name.clone(),
            kind: desc.kind,
            data: vec![0; desc.size as usize],
            lock_flags: None,
            freed: false,
            stats,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>> {
        if self.freed {
            return Err(Error::InvalidParameter(format!("resource '{}' was freed", self.name)));
        }
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::InvalidParameter(format!(
                "range {}+{} outside resource '{}' ({} bytes)", offset, len, self.name, self.data.len()
            )))?;
        Ok(start..end)
    }
}

impl GraphicsResource for NullResource {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn lock(&mut self, flags: LockFlags) -> Result<()> {
        if self.freed {
            return Err(Error::InvalidParameter(format!("cannot lock freed resource '{}'", self.name)));
        }
        self.lock_flags = Some(flags);
        Ok(())
    }

    fn unlock(&mut self) -> Result<()> {
        if self.lock_flags.take().is_none() {
            return Err(Error::InvalidParameter(format!("resource '{}' is not locked", self.name)));
        }
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.lock_flags.is_some()
    }

    fn lock_addr(&self) -> Option<*mut u8> {
        self.lock_flags.map(|_| self.data.as_ptr() as *mut u8)
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        match self.lock_flags {
            Some(flags) if flags.contains(LockFlags::WRITE) => {}
            _ => return Err(Error::InvalidParameter(format!(
                "resource '{}' is not locked for writing", self.name
            ))),
        }
        let range = self.range(offset, data.len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let range = self.range(offset, out.len())?;
        out.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn free(&mut self) {
        if self.freed {
            return;
        }
        self.freed = true;
        self.lock_flags = None;
        self.stats.record_free(self.data.len() as u64);
        self.data = Vec::new();
    }
}

impl Drop for NullResource {
    fn drop(&mut self) {
        self.free();
    }
}
