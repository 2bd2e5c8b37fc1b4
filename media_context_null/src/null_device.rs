/// NullDevice - OsDeviceContext without hardware

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use media_context::media::{Error, Result};
use media_context::media::os::{GraphicsResource, GtSystemInfo, OsDeviceContext, ResourceDesc, ResourceId};
use media_context::{mos_bail_warn, mos_trace, mos_warn};
use crate::null_resource::NullResource;
use crate::stats::{NullStats, StatsTracker};

/// Device context handing out host-memory resources
///
/// `memory_budget` caps the bytes that may be live at once; allocations past
/// it fail with OutOfMemory the way a real device does under pressure.
pub struct NullDevice {
    gt: Mutex<GtSystemInfo>,
    next_id: AtomicU64,
    memory_budget: Option<u64>,
    stats: Arc<StatsTracker>,
}

impl NullDevice {
    pub fn new(gt: GtSystemInfo) -> Self {
        Self {
            gt: Mutex::new(gt),
            next_id: AtomicU64::new(1),
            memory_budget: None,
            stats: Arc::new(StatsTracker::default()),
        }
    }

    /// Device refusing allocations once `budget` bytes are live
    pub fn with_memory_budget(gt: GtSystemInfo, budget: u64) -> Self {
        Self {
            memory_budget: Some(budget),
            ..Self::new(gt)
        }
    }

    /// Change the reported topology (hot-plug style tests)
    pub fn set_gt_system_info(&self, gt: GtSystemInfo) {
        match self.gt.lock() {
            Ok(mut current) => *current = gt,
            Err(poisoned) => *poisoned.into_inner() = gt,
        }
    }

    pub fn stats(&self) -> NullStats {
        self.stats.snapshot()
    }

    pub(crate) fn record_submission(&self) {
        self.stats.record_submission();
    }
}

impl Default for NullDevice {
    fn default() -> Self {
        Self::new(GtSystemInfo::default())
    }
}

impl OsDeviceContext for NullDevice {
    fn allocate_resource(&self, desc: &ResourceDesc) -> Result<Box<dyn GraphicsResource>> {
        if desc.size == 0 {
            mos_bail_warn!("media::NullDevice", InvalidParameter,
                "zero-sized allocation '{}'", desc.name);
        }
        if let Some(budget) = self.memory_budget {
            let live = self.stats.snapshot().live_bytes;
            if live + desc.size > budget {
                mos_warn!("media::NullDevice", "'{}' needs {} bytes, {} of {} in use",
                    desc.name, desc.size, live, budget);
                return Err(Error::OutOfMemory);
            }
        }

        let id = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        mos_trace!("media::NullDevice", "Allocated {:?} '{}' ({} bytes) as {:?}",
            desc.kind, desc.name, desc.size, id);
        Ok(Box::new(NullResource::new(id, desc, Arc::clone(&self.stats))))
    }

    fn wait_for_resource_idle(&self, _resource: ResourceId) -> Result<()> {
        self.stats.record_idle_wait();
        Ok(())
    }

    fn gt_system_info(&self) -> GtSystemInfo {
        match self.gt.lock() {
            Ok(gt) => *gt,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
