/// CmdBufMgr - device-wide pool of command buffers
///
/// Buffers live in a SlotMap and are either *available* (kept sorted by size,
/// largest first) or *in use* by a GPU context. Picking reuses a released
/// buffer when one fits and only allocates when the pool is empty.

use std::sync::{Arc, Mutex};
use rustc_hash::FxHashSet;
use slotmap::{new_key_type, SlotMap};
use crate::config::ContextConfig;
use crate::context::CommandBuffer;
use crate::error::Result;
use crate::os::OsDeviceContext;
use crate::utils::lock;
use crate::{mos_bail, mos_bail_warn, mos_debug, mos_trace};

new_key_type! {
    /// Key of a command buffer inside its CmdBufMgr
    pub struct CommandBufferKey;
}

/// A command buffer shared between the pool and the context using it
pub type SharedCommandBuffer = Arc<Mutex<CommandBuffer>>;

struct CmdBufPools {
    buffers: SlotMap<CommandBufferKey, SharedCommandBuffer>,
    /// (size, key), sorted by size descending
    available: Vec<(u32, CommandBufferKey)>,
    in_use: FxHashSet<CommandBufferKey>,
    initialized: bool,
}

impl CmdBufPools {
    fn insert_available(&mut self, size: u32, key: CommandBufferKey) {
        let position = self.available.partition_point(|(s, _)| *s >= size);
        self.available.insert(position, (size, key));
    }
}

pub struct CmdBufMgr {
    device: Arc<dyn OsDeviceContext>,
    max_command_buffers: u32,
    pools: Mutex<CmdBufPools>,
}

impl CmdBufMgr {
    pub fn new(device: Arc<dyn OsDeviceContext>, config: &ContextConfig) -> Self {
        Self {
            device,
            max_command_buffers: config.max_command_buffers,
            pools: Mutex::new(CmdBufPools {
                buffers: SlotMap::with_key(),
                available: Vec::new(),
                in_use: FxHashSet::default(),
                initialized: false,
            }),
        }
    }

    /// Pre-allocate `count` buffers of `size` bytes
    ///
    /// Calling it again is a no-op.
    pub fn initialize(&self, size: u32, count: u32) -> Result<()> {
        let mut pools = lock(&self.pools);
        if pools.initialized {
            return Ok(());
        }
        if count > self.max_command_buffers {
            mos_bail!("media::CmdBufMgr", InvalidParameter,
                "cannot pre-allocate {} command buffers (max {})", count, self.max_command_buffers);
        }

        for _ in 0..count {
            let mut buffer = CommandBuffer::new();
            buffer.allocate(self.device.as_ref(), size)?;
            let size = buffer.size();
            let key = pools.buffers.insert(Arc::new(Mutex::new(buffer)));
            pools.insert_available(size, key);
        }
        pools.initialized = true;

        mos_debug!("media::CmdBufMgr", "Initialized with {} command buffers of {} bytes", count, size);
        Ok(())
    }

    /// Hand out a command buffer of at least `size` bytes
    ///
    /// The smallest available buffer that fits is reused. When none fits the
    /// largest available one is grown; a new buffer is allocated only when
    /// nothing is available.
    ///
    /// # Errors
    ///
    /// NotEnoughBuffer when the pool already owns `max_command_buffers` and
    /// none is available.
    pub fn pickup_one_cmd_buf(&self, size: u32) -> Result<(CommandBufferKey, SharedCommandBuffer)> {
        if size == 0 {
            mos_bail!("media::CmdBufMgr", InvalidParameter, "requested command buffer size is 0");
        }

        let mut pools = lock(&self.pools);

        let picked = match pools.available.iter().rposition(|(s, _)| *s >= size) {
            Some(position) => Some(pools.available.remove(position)),
            None if !pools.available.is_empty() => Some(pools.available.remove(0)),
            None => None,
        };

        let key = match picked {
            Some((available_size, key)) => {
                if available_size < size {
                    let grown = match pools.buffers.get(key) {
                        Some(buffer) => lock(buffer).resize(self.device.as_ref(), size),
                        None => Ok(()),
                    };
                    if let Err(e) = grown {
                        pools.insert_available(available_size, key);
                        return Err(e);
                    }
                    mos_trace!("media::CmdBufMgr", "Grew command buffer from {} to {} bytes",
                        available_size, size);
                }
                key
            }
            None => {
                if pools.buffers.len() as u32 >= self.max_command_buffers {
                    mos_bail_warn!("media::CmdBufMgr", NotEnoughBuffer,
                        "command buffer pool exhausted ({} buffers in use)", pools.in_use.len());
                }
                let mut buffer = CommandBuffer::new();
                buffer.allocate(self.device.as_ref(), size)?;
                pools.buffers.insert(Arc::new(Mutex::new(buffer)))
            }
        };

        pools.in_use.insert(key);
        match pools.buffers.get(key) {
            Some(buffer) => Ok((key, Arc::clone(buffer))),
            None => mos_bail!("media::CmdBufMgr", Unknown, "picked command buffer vanished"),
        }
    }

    /// Return a buffer to the available list
    ///
    /// The caller must not hold the buffer's lock.
    ///
    /// # Errors
    ///
    /// InvalidParameter if `key` is not currently in use.
    pub fn release_cmd_buf(&self, key: CommandBufferKey) -> Result<()> {
        let mut pools = lock(&self.pools);
        if !pools.in_use.remove(&key) {
            mos_bail!("media::CmdBufMgr", InvalidParameter,
                "command buffer {:?} released but not in use", key);
        }
        let size = match pools.buffers.get(key) {
            Some(buffer) => lock(buffer).size(),
            None => mos_bail!("media::CmdBufMgr", Unknown, "released command buffer vanished"),
        };
        pools.insert_available(size, key);
        Ok(())
    }

    /// Free every buffer and empty the pool
    pub fn clean_up(&self) {
        let mut pools = lock(&self.pools);
        for (_, buffer) in pools.buffers.drain() {
            lock(&buffer).free();
        }
        pools.available.clear();
        pools.in_use.clear();
        pools.initialized = false;
    }

    // ===== STATS =====

    /// Buffers owned by the pool
    pub fn total_count(&self) -> usize {
        lock(&self.pools).buffers.len()
    }

    pub fn available_count(&self) -> usize {
        lock(&self.pools).available.len()
    }

    pub fn in_use_count(&self) -> usize {
        lock(&self.pools).in_use.len()
    }

    /// Sizes of the available buffers, largest first
    pub fn available_sizes(&self) -> Vec<u32> {
        lock(&self.pools).available.iter().map(|(size, _)| *size).collect()
    }
}

impl Drop for CmdBufMgr {
    fn drop(&mut self) {
        self.clean_up();
    }
}

#[cfg(test)]
#[path = "cmd_buf_mgr_tests.rs"]
mod tests;
