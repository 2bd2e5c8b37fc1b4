/// GpuContext - one hardware execution context
///
/// A GPU context owns a ring of command buffers it fetches from the CmdBufMgr,
/// the primary/secondary cursors callers write through, the per-submission
/// allocation and patch lists, and a status buffer the GPU writes completion
/// tags into. All state sits behind one mutex so a context can be shared by
/// several media contexts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::config::ContextConfig;
use crate::context::{CmdBufMgr, CommandBufferKey, SharedCommandBuffer};
use crate::error::{Error, Result};
use crate::os::{
    GpuContextCreateOptions, GpuContextHandle, GpuNode, GraphicsResource, LegacyGpuContext,
    LockFlags, OsDeviceContext, OsInterface, PatchLocation, ResourceDesc, ResourceId,
    ResourceKind, Submission, SubmissionType,
};
use crate::utils::{align_up, lock};
use crate::{mos_bail, mos_bail_warn, mos_debug, mos_err, mos_error, mos_trace, mos_warn};

/// Process-wide use clock; contexts stamp it on every command buffer fetch
static USE_CLOCK: AtomicU64 = AtomicU64::new(1);

fn next_use_stamp() -> u64 {
    USE_CLOCK.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// CommandBufferView
// ============================================================================

/// Write cursor into a command buffer handed out by [`GpuContext::get_command_buffer`]
///
/// The view owns a reference to the buffer; commands written through it land
/// in the buffer immediately. The context only learns the new cursor position
/// when the view is passed back with [`GpuContext::return_command_buffer`].
#[derive(Clone)]
pub struct CommandBufferView {
    buffer: SharedCommandBuffer,
    resource: ResourceId,
    offset: u32,
    remaining: u32,
    cmd_index: usize,
    secondary_index: u32,
    /// VDBOX the buffer targets in a multi-pipe submission
    pub vdbox_node_index: Option<u8>,
    /// Role of this buffer in the submission
    pub submission_type: SubmissionType,
}

impl CommandBufferView {
    /// Append raw command bytes
    ///
    /// # Errors
    ///
    /// NotEnoughBuffer if `data` does not fit in the remaining space; nothing
    /// is written in that case.
    pub fn add_command(&mut self, data: &[u8]) -> Result<()> {
        let len = data.len() as u32;
        if data.len() > u32::MAX as usize || len > self.remaining {
            mos_bail_warn!("media::GpuContext", NotEnoughBuffer,
                "command of {} bytes does not fit ({} bytes remaining)", data.len(), self.remaining);
        }
        lock(&self.buffer).write(self.offset, data)?;
        self.offset += len;
        self.remaining -= len;
        Ok(())
    }

    /// Append little-endian dwords
    pub fn add_dwords(&mut self, dwords: &[u32]) -> Result<()> {
        let bytes: Vec<u8> = dwords.iter().flat_map(|d| d.to_le_bytes()).collect();
        self.add_command(&bytes)
    }

    /// Read back bytes already written to the buffer
    pub fn read(&self, offset: u32, out: &mut [u8]) -> Result<()> {
        lock(&self.buffer).read(offset, out)
    }

    /// Bytes written so far
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Bytes still writable
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Slot of the buffer in the context's ring
    pub fn cmd_index(&self) -> usize {
        self.cmd_index
    }

    /// 0 for the primary buffer, the pipe index otherwise
    pub fn secondary_index(&self) -> u32 {
        self.secondary_index
    }

    pub fn is_primary(&self) -> bool {
        self.secondary_index == 0
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource
    }
}

// ============================================================================
// GpuContext
// ============================================================================

struct RingEntry {
    key: CommandBufferKey,
    buffer: SharedCommandBuffer,
}

#[derive(Clone)]
struct Cursor {
    buffer: SharedCommandBuffer,
    resource: ResourceId,
    offset: u32,
    remaining: u32,
    cmd_index: usize,
    vdbox_node_index: Option<u8>,
    submission_type: SubmissionType,
}

struct GpuContextState {
    command_buffer_size: u32,
    max_cmd_buf_num: usize,
    /// Slots are None only after a failed refetch
    ring: Vec<Option<RingEntry>>,
    next_fetch_index: usize,
    cmd_buf_flushed: bool,
    primary: Option<Cursor>,
    secondary: FxHashMap<u32, Cursor>,
    indirect_heap_size: u32,
    patch_locations: Vec<PatchLocation>,
    max_patch_locations: u32,
    /// (resource, GPU writes it)
    allocations: Vec<(ResourceId, bool)>,
    max_allocations: u32,
    status_buffer: Option<Box<dyn GraphicsResource>>,
    status_tag: u32,
    priority: i32,
    latched_error: Option<Error>,
    submissions: u64,
    destroyed: bool,
}

pub struct GpuContext {
    handle: GpuContextHandle,
    node: GpuNode,
    legacy: Option<LegacyGpuContext>,
    options: GpuContextCreateOptions,
    device: Arc<dyn OsDeviceContext>,
    cmd_buf_mgr: Arc<CmdBufMgr>,
    last_used: AtomicU64,
    state: Mutex<GpuContextState>,
}

impl GpuContext {
    /// Create a context and its status buffer
    ///
    /// Called by GpuContextMgr; `handle` is the arena slot reserved for it.
    pub(crate) fn new(
        handle: GpuContextHandle,
        node: GpuNode,
        legacy: Option<LegacyGpuContext>,
        device: Arc<dyn OsDeviceContext>,
        cmd_buf_mgr: Arc<CmdBufMgr>,
        config: &ContextConfig,
        options: &GpuContextCreateOptions,
    ) -> Result<Self> {
        let mut status_buffer = device.allocate_resource(&ResourceDesc::buffer(
            "GpuContextStatusBuffer",
            config.status_buffer_size as u64,
            ResourceKind::StatusBuffer,
        ))?;
        status_buffer.lock(LockFlags::READ | LockFlags::WRITE | LockFlags::PERSISTENT)?;

        let ring_len = config
            .max_cmd_buf_num
            .saturating_mul(options.cmd_buffer_num_scale.max(1) as usize);

        Ok(Self {
            handle,
            node,
            legacy,
            options: options.clone(),
            device,
            cmd_buf_mgr,
            last_used: AtomicU64::new(next_use_stamp()),
            state: Mutex::new(GpuContextState {
                command_buffer_size: align_up(config.command_buffer_size, 8),
                max_cmd_buf_num: ring_len,
                ring: Vec::with_capacity(ring_len),
                next_fetch_index: 0,
                cmd_buf_flushed: true,
                primary: None,
                secondary: FxHashMap::default(),
                indirect_heap_size: 0,
                patch_locations: Vec::with_capacity(config.patch_list_size as usize),
                max_patch_locations: config.patch_list_size,
                allocations: Vec::with_capacity(config.allocation_list_size as usize),
                max_allocations: config.allocation_list_size,
                status_buffer: Some(status_buffer),
                status_tag: 1,
                priority: if options.is_real_time_priority { 1 } else { 0 },
                latched_error: None,
                submissions: 0,
                destroyed: false,
            }),
        })
    }

    fn lock_live(&self) -> Result<std::sync::MutexGuard<'_, GpuContextState>> {
        let state = lock(&self.state);
        if state.destroyed {
            mos_bail!("media::GpuContext", InvalidParameter,
                "GPU context {} is destroyed", self.handle);
        }
        Ok(state)
    }

    // ===== COMMAND BUFFERS =====

    /// Get the primary (`flags == 0`) or a secondary (`flags == pipe index`)
    /// command buffer
    ///
    /// A new buffer is fetched from the ring after the primary was submitted
    /// (or on first use); otherwise the cursor left by the last
    /// [`return_command_buffer`](Self::return_command_buffer) is handed out
    /// again. Once the ring is full the oldest slot is recycled after waiting
    /// for the GPU to release it.
    pub fn get_command_buffer(&self, flags: u32) -> Result<CommandBufferView> {
        let mut state = self.lock_live()?;
        if let Some(e) = &state.latched_error {
            mos_bail!("media::GpuContext", Unknown,
                "GPU context {} has a latched error ({}), reset its status first", self.handle, e);
        }

        let primary = flags == 0;
        let need_fetch = if primary {
            state.cmd_buf_flushed
        } else {
            !state.secondary.contains_key(&flags)
        };

        if need_fetch {
            let cursor = self.fetch_command_buffer(&mut state, primary)?;
            if primary {
                state.cmd_buf_flushed = false;
                state.primary = Some(cursor);
            } else {
                state.secondary.insert(flags, cursor);
            }
        }

        let cursor = if primary {
            state.primary.clone()
        } else {
            state.secondary.get(&flags).cloned()
        };
        let cursor = cursor.ok_or_else(|| mos_err!("media::GpuContext", Unknown,
            "no command buffer cursor for flags {}", flags))?;

        register_locked(&mut state, cursor.resource, false, self.handle)?;
        self.last_used.store(next_use_stamp(), Ordering::Relaxed);

        Ok(CommandBufferView {
            buffer: cursor.buffer,
            resource: cursor.resource,
            offset: cursor.offset,
            remaining: cursor.remaining,
            cmd_index: cursor.cmd_index,
            secondary_index: flags,
            vdbox_node_index: cursor.vdbox_node_index,
            submission_type: cursor.submission_type,
        })
    }

    fn fetch_command_buffer(&self, state: &mut GpuContextState, primary: bool) -> Result<Cursor> {
        let index = state.next_fetch_index;
        let size = state.command_buffer_size;

        if let Some(old) = state.ring.get(index).and_then(Option::as_ref) {
            let still_written = state
                .primary
                .iter()
                .filter(|_| !state.cmd_buf_flushed)
                .chain(state.secondary.values())
                .any(|cursor| Arc::ptr_eq(&cursor.buffer, &old.buffer));
            if still_written {
                mos_bail_warn!("media::GpuContext", NotEnoughBuffer,
                    "command buffer ring of context {} is exhausted by unsubmitted buffers", self.handle);
            }
        }

        if let Some(old) = state.ring.get_mut(index).and_then(Option::take) {
            {
                let mut cb = lock(&old.buffer);
                cb.wait_ready(self.device.as_ref())?;
                cb.unbind_to_gpu_context();
            }
            self.cmd_buf_mgr.release_cmd_buf(old.key)?;
        }

        let (key, buffer) = self.cmd_buf_mgr.pickup_one_cmd_buf(size)?;
        let resource = {
            let mut cb = lock(&buffer);
            cb.bind_to_gpu_context(self.handle)?;
            cb.clear_contents()?;
            cb.resource_id()
        };
        let resource = resource.ok_or_else(|| mos_err!("media::GpuContext", NullPointer,
            "picked command buffer has no resource"))?;

        let entry = RingEntry { key, buffer: Arc::clone(&buffer) };
        if index < state.ring.len() {
            state.ring[index] = Some(entry);
        } else {
            state.ring.push(Some(entry));
        }
        state.next_fetch_index = (index + 1) % state.max_cmd_buf_num;

        mos_trace!("media::GpuContext", "Context {} fetched command buffer {:?} into slot {}",
            self.handle, resource, index);

        Ok(Cursor {
            buffer,
            resource,
            offset: 0,
            remaining: size.saturating_sub(state.indirect_heap_size),
            cmd_index: index,
            vdbox_node_index: None,
            submission_type: if primary {
                SubmissionType::SinglePipe
            } else {
                SubmissionType::MultiPipeSlave
            },
        })
    }

    /// Store the cursor of a view back into the context
    ///
    /// `flags` selects primary (0) or the secondary buffer of that pipe.
    pub fn return_command_buffer(&self, view: &CommandBufferView, flags: u32) -> Result<()> {
        let mut state = self.lock_live()?;
        let cursor = if flags == 0 {
            state.primary.as_mut()
        } else {
            state.secondary.get_mut(&flags)
        };
        let Some(cursor) = cursor else {
            mos_bail!("media::GpuContext", InvalidParameter,
                "no command buffer outstanding for flags {}", flags);
        };
        if cursor.resource != view.resource {
            mos_bail!("media::GpuContext", InvalidParameter,
                "returned view does not belong to the current buffer (flags {})", flags);
        }
        cursor.offset = view.offset;
        cursor.remaining = view.remaining;
        cursor.vdbox_node_index = view.vdbox_node_index;
        cursor.submission_type = view.submission_type;
        Ok(())
    }

    /// Drop the current buffers so the next get fetches fresh ones
    pub fn reset_command_buffer(&self) -> Result<()> {
        let mut state = self.lock_live()?;
        state.cmd_buf_flushed = true;
        state.primary = None;
        state.secondary.clear();
        Ok(())
    }

    /// Submit the primary buffer (and any secondaries) to the OS layer
    ///
    /// With `null_rendering` nothing is dispatched but the flush bookkeeping
    /// still runs. On failure the error is latched until
    /// [`reset_gpu_context_status`](Self::reset_gpu_context_status).
    ///
    /// # Errors
    ///
    /// InvalidParameter unless `view` is the current, not yet submitted
    /// primary buffer.
    pub fn submit_command_buffer(
        &self,
        os: &dyn OsInterface,
        view: &CommandBufferView,
        null_rendering: bool,
    ) -> Result<()> {
        let mut state = self.lock_live()?;
        if !view.is_primary() {
            mos_bail!("media::GpuContext", InvalidParameter,
                "only the primary command buffer is submitted (got pipe {})", view.secondary_index);
        }

        let current = match state.primary.as_ref() {
            Some(cursor) if !state.cmd_buf_flushed => cursor.resource,
            _ => mos_bail!("media::GpuContext", InvalidParameter,
                "context {} has no unsubmitted primary command buffer", self.handle),
        };
        if current != view.resource {
            mos_bail!("media::GpuContext", InvalidParameter,
                "submitted view {:?} is not the current primary buffer {:?} of context {}",
                view.resource, current, self.handle);
        }

        state.cmd_buf_flushed = true;

        let mut secondary_indices: Vec<u32> = state.secondary.keys().copied().collect();
        secondary_indices.sort_unstable();
        let secondary_buffers: Vec<ResourceId> = secondary_indices
            .iter()
            .filter_map(|i| state.secondary.get(i).map(|c| c.resource))
            .collect();
        let submission_type = if secondary_buffers.len() >= 2 {
            SubmissionType::MultiPipeMaster
        } else {
            view.submission_type
        };
        let allocations: Vec<ResourceId> = state.allocations.iter().map(|(id, _)| *id).collect();

        let result = if null_rendering {
            mos_trace!("media::GpuContext", "Null rendering: skipped submission on context {}",
                self.handle);
            Ok(())
        } else {
            let submission = Submission {
                gpu_context: self.handle,
                node: self.node,
                command_buffer: view.resource,
                used_bytes: view.offset,
                submission_type,
                secondary_buffers,
                allocations: &allocations,
                patch_locations: &state.patch_locations,
                status_tag: state.status_tag,
                priority: state.priority,
            };
            os.exec(&submission)
        };

        if let Err(e) = result {
            mos_error!("media::GpuContext", "Submission on context {} failed: {}", self.handle, e);
            state.latched_error = Some(e.clone());
            return Err(e);
        }

        if !null_rendering {
            lock(&view.buffer).set_ready_to_use(false);
            for cursor in state.secondary.values() {
                lock(&cursor.buffer).set_ready_to_use(false);
            }
        }

        state.secondary.clear();
        state.allocations.clear();
        state.patch_locations.clear();
        state.submissions += 1;
        let tag = increment_status_tag(&mut state);
        if let Some(status) = state.status_buffer.as_mut() {
            if let Err(e) = status.write(0, &tag.to_le_bytes()) {
                mos_warn!("media::GpuContext", "Failed to publish status tag {}: {}", tag, e);
            }
        }
        Ok(())
    }

    /// Grow the command buffer size and patch list capacity
    ///
    /// Only growth takes effect; buffers fetched afterwards use the new size.
    pub fn resize_command_buffer_and_patch_list(
        &self,
        requested_command_buffer_size: u32,
        requested_patch_list_size: u32,
        _flags: u32,
    ) -> Result<()> {
        let mut state = self.lock_live()?;
        let aligned = align_up(requested_command_buffer_size, 8);
        if aligned > state.command_buffer_size {
            mos_debug!("media::GpuContext", "Context {} command buffer size {} -> {}",
                self.handle, state.command_buffer_size, aligned);
            state.command_buffer_size = aligned;
        }
        if requested_patch_list_size > state.max_patch_locations {
            let extra = (requested_patch_list_size as usize).saturating_sub(state.patch_locations.len());
            state.patch_locations.reserve(extra);
            state.max_patch_locations = requested_patch_list_size;
        }
        Ok(())
    }

    /// Check that buffers of this context can hold `requested_size` bytes
    ///
    /// # Errors
    ///
    /// NotEnoughBuffer when a resize is needed first.
    pub fn verify_command_buffer_size(&self, requested_size: u32) -> Result<()> {
        let state = self.lock_live()?;
        if state.command_buffer_size < requested_size {
            mos_bail_warn!("media::GpuContext", NotEnoughBuffer,
                "command buffer of context {} holds {} bytes, {} requested",
                self.handle, state.command_buffer_size, requested_size);
        }
        Ok(())
    }

    // ===== STATUS / REGISTRATION =====

    /// Clear the latched error and the per-submission lists
    pub fn reset_gpu_context_status(&self) -> Result<()> {
        let mut state = self.lock_live()?;
        state.latched_error = None;
        state.allocations.clear();
        state.patch_locations.clear();
        Ok(())
    }

    /// Add a resource to the allocation list of the next submission
    ///
    /// Returns its index in the list. Registering a resource twice keeps a
    /// single entry (upgraded to write access if either registration writes).
    pub fn register_resource(&self, resource: ResourceId, write: bool) -> Result<u32> {
        let mut state = self.lock_live()?;
        register_locked(&mut state, resource, write, self.handle)
    }

    /// Add a relocation to the next submission
    pub fn set_patch_entry(&self, patch: PatchLocation) -> Result<()> {
        let mut state = self.lock_live()?;
        if patch.allocation_index as usize >= state.allocations.len() {
            mos_bail!("media::GpuContext", InvalidParameter,
                "patch references allocation {} but only {} are registered",
                patch.allocation_index, state.allocations.len());
        }
        if state.patch_locations.len() as u32 >= state.max_patch_locations {
            mos_bail_warn!("media::GpuContext", NotEnoughBuffer,
                "patch list of context {} is full ({} entries)", self.handle, state.max_patch_locations);
        }
        state.patch_locations.push(patch);
        Ok(())
    }

    /// Reserve `size` bytes at the end of each command buffer for indirect state
    ///
    /// # Errors
    ///
    /// InvalidParameter if `size` is not smaller than the command buffer size.
    pub fn set_indirect_state_size(&self, size: u32) -> Result<()> {
        let mut state = self.lock_live()?;
        if size >= state.command_buffer_size {
            mos_bail!("media::GpuContext", InvalidParameter,
                "indirect state size {} must be smaller than the command buffer ({} bytes)",
                size, state.command_buffer_size);
        }
        state.indirect_heap_size = size;
        Ok(())
    }

    /// Offset and size of the indirect state region
    pub fn indirect_state(&self) -> Result<(u32, u32)> {
        let state = self.lock_live()?;
        Ok((state.command_buffer_size - state.indirect_heap_size, state.indirect_heap_size))
    }

    /// Tag the next submission will signal
    pub fn gpu_status_tag(&self) -> u32 {
        lock(&self.state).status_tag
    }

    /// Advance the status tag without submitting
    pub fn increment_gpu_status_tag(&self) -> Result<u32> {
        let mut state = self.lock_live()?;
        Ok(increment_status_tag(&mut state))
    }

    /// Last tag published in the status buffer (0 before the first submission)
    pub fn completed_status_tag(&self) -> Result<u32> {
        let state = self.lock_live()?;
        let mut bytes = [0u8; 4];
        if let Some(status) = state.status_buffer.as_ref() {
            status.read(0, &mut bytes)?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    /// Resource the GPU writes completion tags into
    pub fn status_buffer_id(&self) -> Option<ResourceId> {
        lock(&self.state).status_buffer.as_ref().map(|b| b.id())
    }

    pub fn update_priority(&self, priority: i32) -> Result<()> {
        let mut state = self.lock_live()?;
        state.priority = priority;
        Ok(())
    }

    // ===== TEARDOWN =====

    /// Return every ring buffer to the CmdBufMgr and free the status buffer
    ///
    /// Idempotent. Later operations fail with InvalidParameter.
    pub(crate) fn clear(&self) {
        let mut state = lock(&self.state);
        if state.destroyed {
            return;
        }
        state.destroyed = true;

        for entry in state.ring.drain(..).flatten() {
            {
                let mut cb = lock(&entry.buffer);
                if let Err(e) = cb.wait_ready(self.device.as_ref()) {
                    mos_warn!("media::GpuContext", "Waiting on command buffer failed: {}", e);
                }
                cb.unbind_to_gpu_context();
            }
            if let Err(e) = self.cmd_buf_mgr.release_cmd_buf(entry.key) {
                mos_warn!("media::GpuContext", "Releasing command buffer failed: {}", e);
            }
        }
        state.primary = None;
        state.secondary.clear();
        state.allocations.clear();
        state.patch_locations.clear();

        if let Some(mut status) = state.status_buffer.take() {
            status.free();
        }

        mos_debug!("media::GpuContext", "Context {} cleared after {} submissions",
            self.handle, state.submissions);
    }

    // ===== ACCESSORS =====

    pub fn handle(&self) -> GpuContextHandle {
        self.handle
    }

    pub fn node(&self) -> GpuNode {
        self.node
    }

    /// Legacy identifier this context was created for, if any
    pub fn legacy(&self) -> Option<LegacyGpuContext> {
        self.legacy
    }

    /// Options the context was created with
    pub fn create_options(&self) -> &GpuContextCreateOptions {
        &self.options
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    /// Use stamp of the last command buffer fetch (higher is more recent)
    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }

    pub fn command_buffer_size(&self) -> u32 {
        lock(&self.state).command_buffer_size
    }

    pub fn max_patch_list_size(&self) -> u32 {
        lock(&self.state).max_patch_locations
    }

    /// Buffers currently held in the ring
    pub fn ring_len(&self) -> usize {
        lock(&self.state).ring.iter().flatten().count()
    }

    pub fn allocation_count(&self) -> usize {
        lock(&self.state).allocations.len()
    }

    pub fn patch_count(&self) -> usize {
        lock(&self.state).patch_locations.len()
    }

    pub fn priority(&self) -> i32 {
        lock(&self.state).priority
    }

    pub fn submission_count(&self) -> u64 {
        lock(&self.state).submissions
    }

    pub fn latched_error(&self) -> Option<Error> {
        lock(&self.state).latched_error.clone()
    }

    pub fn is_cmd_buf_flushed(&self) -> bool {
        lock(&self.state).cmd_buf_flushed
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        self.clear();
    }
}

fn register_locked(
    state: &mut GpuContextState,
    resource: ResourceId,
    write: bool,
    handle: GpuContextHandle,
) -> Result<u32> {
    if let Some(index) = state.allocations.iter().position(|(id, _)| *id == resource) {
        state.allocations[index].1 |= write;
        return Ok(index as u32);
    }
    if state.allocations.len() as u32 >= state.max_allocations {
        mos_bail_warn!("media::GpuContext", NotEnoughBuffer,
            "allocation list of context {} is full ({} entries)", handle, state.max_allocations);
    }
    state.allocations.push((resource, write));
    Ok(state.allocations.len() as u32 - 1)
}

/// Status tags wrap around and skip 0, which means "never signalled"
fn increment_status_tag(state: &mut GpuContextState) -> u32 {
    let current = state.status_tag;
    state.status_tag = match current.wrapping_add(1) {
        0 => 1,
        next => next,
    };
    current
}

#[cfg(test)]
#[path = "gpu_context_tests.rs"]
mod tests;
