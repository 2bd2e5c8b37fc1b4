/// GpuContextMgr - device-wide arena of GPU contexts
///
/// Contexts are addressed by [`GpuContextHandle`], the index of their arena
/// slot. Destroyed slots are recycled lowest index first. When the number of
/// live contexts reaches `max_gpu_contexts` the manager stops creating new
/// ones and hands out the least recently used context of the requested node
/// whose creation options are compatible (same lane count, SFC, virtual
/// engine and protected mode) instead; every slot counts the users sharing
/// it and the context is only cleared when the last one lets go.

use std::sync::{Arc, Mutex};
use crate::config::ContextConfig;
use crate::context::{CmdBufMgr, GpuContext};
use crate::error::Result;
use crate::os::{GpuContextCreateOptions, GpuContextHandle, GpuNode, LegacyGpuContext, OsDeviceContext};
use crate::utils::{lock, SlotAllocator};
use crate::{mos_bail_warn, mos_debug, mos_warn};

struct GpuContextSlot {
    context: Arc<GpuContext>,
    users: u32,
}

struct GpuContextArena {
    slots: Vec<Option<GpuContextSlot>>,
    handles: SlotAllocator,
}

impl GpuContextArena {
    fn live(&self) -> impl Iterator<Item = &GpuContextSlot> {
        self.slots.iter().flatten()
    }

    fn is_full(&self, max_gpu_contexts: u32) -> bool {
        self.handles.len() >= max_gpu_contexts
    }

    fn least_recently_used(&self, node: GpuNode, options: &GpuContextCreateOptions) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|s| (index, s)))
            .filter(|(_, s)| {
                s.context.node() == node
                    && s.context.create_options().is_compatible_with(options)
                    && !s.context.is_destroyed()
            })
            .min_by_key(|(_, s)| s.context.last_used())
            .map(|(index, _)| index)
    }
}

pub struct GpuContextMgr {
    device: Arc<dyn OsDeviceContext>,
    config: ContextConfig,
    arena: Mutex<GpuContextArena>,
}

impl GpuContextMgr {
    pub fn new(device: Arc<dyn OsDeviceContext>, config: ContextConfig) -> Self {
        Self {
            device,
            config,
            arena: Mutex::new(GpuContextArena {
                slots: Vec::new(),
                handles: SlotAllocator::new(),
            }),
        }
    }

    /// Create a GPU context on `node`
    ///
    /// When [`context_reuse_needed`](Self::context_reuse_needed) reports the
    /// arena full, an existing context of the same node and compatible
    /// `options` is shared instead (see
    /// [`select_context_to_reuse`](Self::select_context_to_reuse)).
    ///
    /// # Errors
    ///
    /// - NotEnoughBuffer if the arena is full and no compatible context of
    ///   `node` exists
    /// - whatever context creation reports (status buffer allocation)
    pub fn create_gpu_context(
        &self,
        node: GpuNode,
        cmd_buf_mgr: &Arc<CmdBufMgr>,
        legacy: Option<LegacyGpuContext>,
        options: &GpuContextCreateOptions,
    ) -> Result<Arc<GpuContext>> {
        let mut arena = lock(&self.arena);

        if arena.is_full(self.config.max_gpu_contexts) {
            let Some(index) = arena.least_recently_used(node, options) else {
                mos_bail_warn!("media::GpuContextMgr", NotEnoughBuffer,
                    "{} GPU contexts live and none on {:?} with {} lane(s) to share",
                    arena.handles.len(), node, options.lane_count());
            };
            let Some(slot) = arena.slots[index].as_mut() else {
                mos_bail_warn!("media::GpuContextMgr", NotEnoughBuffer,
                    "reuse candidate {} vanished", index);
            };
            slot.users += 1;
            mos_debug!("media::GpuContextMgr", "Reusing GPU context {} on {:?} ({} users)",
                slot.context.handle(), node, slot.users);
            return Ok(Arc::clone(&slot.context));
        }

        let index = arena.handles.alloc();
        let handle = GpuContextHandle(index);
        let context = match GpuContext::new(
            handle,
            node,
            legacy,
            Arc::clone(&self.device),
            Arc::clone(cmd_buf_mgr),
            &self.config,
            options,
        ) {
            Ok(context) => Arc::new(context),
            Err(e) => {
                arena.handles.free(index);
                return Err(e);
            }
        };

        let capacity = arena.handles.high_water_mark() as usize;
        if arena.slots.len() < capacity {
            arena.slots.resize_with(capacity, || None);
        }
        arena.slots[handle.index()] = Some(GpuContextSlot {
            context: Arc::clone(&context),
            users: 1,
        });

        mos_debug!("media::GpuContextMgr", "Created GPU context {} on {:?} ({:?})",
            handle, node, legacy);
        Ok(context)
    }

    /// Whether the next create will share an existing context
    pub fn context_reuse_needed(&self) -> bool {
        lock(&self.arena).is_full(self.config.max_gpu_contexts)
    }

    /// Least recently used live context on `node` created with options
    /// compatible with `options`
    pub fn select_context_to_reuse(
        &self,
        node: GpuNode,
        options: &GpuContextCreateOptions,
    ) -> Option<Arc<GpuContext>> {
        let arena = lock(&self.arena);
        arena
            .least_recently_used(node, options)
            .and_then(|index| arena.slots[index].as_ref())
            .map(|slot| Arc::clone(&slot.context))
    }

    /// Look up a live context
    pub fn get_gpu_context(&self, handle: GpuContextHandle) -> Option<Arc<GpuContext>> {
        lock(&self.arena)
            .slots
            .get(handle.index())
            .and_then(Option::as_ref)
            .map(|slot| Arc::clone(&slot.context))
    }

    /// Release one user of `context`
    ///
    /// Returns false if `context` is not the live occupant of its slot (it was
    /// already destroyed, or its handle was recycled for another context).
    pub fn destroy_gpu_context(&self, context: &Arc<GpuContext>) -> bool {
        let mut arena = lock(&self.arena);
        let index = context.handle().index();
        let matches = arena
            .slots
            .get(index)
            .and_then(Option::as_ref)
            .map_or(false, |slot| Arc::ptr_eq(&slot.context, context));
        if !matches {
            mos_warn!("media::GpuContextMgr", "GPU context {} is not live, nothing to destroy",
                context.handle());
            return false;
        }
        Self::release_slot(&mut arena, index);
        true
    }

    /// Release one user of the context at `handle`
    pub fn destroy_gpu_context_by_handle(&self, handle: GpuContextHandle) -> bool {
        let mut arena = lock(&self.arena);
        if !arena.handles.is_allocated(handle.0) {
            mos_warn!("media::GpuContextMgr", "GPU context {} is not live, nothing to destroy", handle);
            return false;
        }
        Self::release_slot(&mut arena, handle.index());
        true
    }

    fn release_slot(arena: &mut GpuContextArena, index: usize) {
        let remaining = match arena.slots[index].as_mut() {
            Some(slot) => {
                slot.users = slot.users.saturating_sub(1);
                slot.users
            }
            None => return,
        };
        if remaining > 0 {
            mos_debug!("media::GpuContextMgr", "GPU context #{} still has {} users", index, remaining);
            return;
        }
        if let Some(slot) = arena.slots[index].take() {
            slot.context.clear();
            arena.handles.free(index as u32);
            mos_debug!("media::GpuContextMgr", "Destroyed GPU context {}", slot.context.handle());
        }
    }

    /// Clear every context regardless of users and empty the arena
    pub fn destroy_all_gpu_contexts(&self) {
        let mut arena = lock(&self.arena);
        if arena.handles.is_empty() {
            return;
        }
        let count = arena.handles.len();
        for slot in arena.slots.drain(..).flatten() {
            slot.context.clear();
        }
        arena.handles = SlotAllocator::new();
        mos_debug!("media::GpuContextMgr", "Destroyed all {} GPU contexts", count);
    }

    /// Number of live contexts
    pub fn gpu_context_number(&self) -> u32 {
        lock(&self.arena).handles.len()
    }

    /// Users sharing the context at `handle` (0 if none is live)
    pub fn user_count(&self, handle: GpuContextHandle) -> u32 {
        lock(&self.arena)
            .slots
            .get(handle.index())
            .and_then(Option::as_ref)
            .map_or(0, |slot| slot.users)
    }

    /// Live contexts per node, in arena order
    pub fn live_nodes(&self) -> Vec<(GpuContextHandle, GpuNode)> {
        lock(&self.arena)
            .live()
            .map(|slot| (slot.context.handle(), slot.context.node()))
            .collect()
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }
}

impl Drop for GpuContextMgr {
    fn drop(&mut self) {
        self.destroy_all_gpu_contexts();
    }
}

#[cfg(test)]
#[path = "gpu_context_mgr_tests.rs"]
mod tests;
