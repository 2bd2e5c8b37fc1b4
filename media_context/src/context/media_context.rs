/// MediaContext - per-session façade over GPU context selection
///
/// Pipeline code calls [`MediaContext::switch_context`] once per frame with
/// the function it is about to run and the scalability shape it needs. The
/// media context keeps an append-only table of the (function, scalability
/// state, legacy identifier, GPU context) rows it created and hands back the
/// first row whose state matches, creating a new row only on a miss.
///
/// The table lock is held across search and append, so concurrent switches
/// with the same key never create duplicate rows.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use crate::config::ContextConfig;
use crate::context::{
    function_to_gpu_context, function_to_node, GpuContextBackend, MediaFunction,
};
use crate::error::Result;
use crate::os::{GpuContextHandle, GpuNode, LegacyGpuContext, OsInterface};
use crate::scalability::{
    ComponentType, HwInterface, MediaContextId, ScalabilityFactory, ScalabilityOption,
    SharedScalability,
};
use crate::utils::lock;
use crate::{mos_bail, mos_bail_warn, mos_debug, mos_err, mos_error, mos_info, mos_trace, mos_warn};

static NEXT_STREAM_ID: AtomicU32 = AtomicU32::new(1);

/// One row of the attribute table
///
/// `scalability` and `gpu_context` are only None after the media context was
/// destroyed.
pub struct GpuContextAttribute {
    pub func: MediaFunction,
    pub scalability: Option<SharedScalability>,
    pub ctx_for_legacy_mos: LegacyGpuContext,
    pub gpu_context: Option<GpuContextHandle>,
    pub node: GpuNode,
}

/// Result of a successful switch
#[derive(Clone)]
pub struct SwitchedContext {
    /// Row in the attribute table
    pub index: usize,
    pub gpu_context: GpuContextHandle,
    pub legacy: LegacyGpuContext,
    pub node: GpuNode,
    pub scalability: SharedScalability,
    /// The row existed before this switch
    pub reused: bool,
}

struct AttributeTable {
    rows: Vec<GpuContextAttribute>,
    current: Option<usize>,
    destroyed: bool,
}

pub struct MediaContext {
    component_type: ComponentType,
    stream_id: u32,
    os: Arc<dyn OsInterface>,
    hw_interface: Option<Arc<dyn HwInterface>>,
    backend: Box<dyn GpuContextBackend>,
    factory: Arc<dyn ScalabilityFactory>,
    max_attribute_table_size: usize,
    table: Mutex<AttributeTable>,
}

impl MediaContext {
    /// Create a media context for one component of a session
    ///
    /// # Errors
    ///
    /// InvalidParameter if `config` does not validate.
    pub fn new(
        component_type: ComponentType,
        os: Arc<dyn OsInterface>,
        hw_interface: Option<Arc<dyn HwInterface>>,
        backend: Box<dyn GpuContextBackend>,
        factory: Arc<dyn ScalabilityFactory>,
        config: &ContextConfig,
    ) -> Result<Self> {
        config.validate()?;
        let stream_id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);

        mos_info!("media::MediaContext", "Media context for {:?} (stream {}, {} backend)",
            component_type, stream_id, backend.name());

        Ok(Self {
            component_type,
            stream_id,
            os,
            hw_interface,
            backend,
            factory,
            max_attribute_table_size: config.max_attribute_table_size,
            table: Mutex::new(AttributeTable {
                rows: Vec::new(),
                current: None,
                destroyed: false,
            }),
        })
    }

    fn id(&self) -> MediaContextId {
        MediaContextId {
            component_type: self.component_type,
            stream_id: self.stream_id,
        }
    }

    /// Select (or create) the GPU context for `func` under `requirement`
    ///
    /// On success the legacy identifier of the row is bound to its handle and
    /// made current, the row's virtual-engine state is published, ENC/PAK
    /// bindings are updated when requested and per-call OS state is reset.
    ///
    /// # Errors
    ///
    /// - InvalidParameter for an invalid requirement or a destroyed context
    /// - NotEnoughBuffer when the table is full and no row matches
    /// - NotSupported when the function has no engine on this GT
    /// - whatever the factory, the backend or the OS binding reports
    pub fn switch_context(&self, func: MediaFunction, requirement: &ScalabilityOption) -> Result<SwitchedContext> {
        requirement.validate()?;

        let mut table = lock(&self.table);
        if table.destroyed {
            mos_bail!("media::MediaContext", InvalidParameter,
                "stream {} media context is destroyed", self.stream_id);
        }

        let (index, reused) = self.search_context_attribute_table(&mut table, func, requirement)?;

        let row = &table.rows[index];
        let scalability = row.scalability.clone().ok_or_else(|| mos_err!("media::MediaContext",
            Unknown, "row {} has no scalability state", index))?;
        let gpu_context = row.gpu_context.ok_or_else(|| mos_err!("media::MediaContext",
            Unknown, "row {} has no GPU context", index))?;
        let legacy = row.ctx_for_legacy_mos;
        let node = row.node;

        if requirement.is_enc {
            self.os.set_encode_enc_context(legacy);
        }
        if requirement.is_pak {
            self.os.set_encode_pak_context(legacy);
        }

        table.current = Some(index);
        self.os.reset_os_states();

        mos_trace!("media::MediaContext", "Stream {} switched to row {} ({:?} on {}, {})",
            self.stream_id, index, legacy, gpu_context, if reused { "reused" } else { "new" });

        Ok(SwitchedContext {
            index,
            gpu_context,
            legacy,
            node,
            scalability,
            reused,
        })
    }

    /// [`switch_context`](Self::switch_context) for a raw function value
    pub fn switch_context_raw(&self, func: u32, requirement: &ScalabilityOption) -> Result<SwitchedContext> {
        let func = MediaFunction::try_from(func)?;
        self.switch_context(func, requirement)
    }

    /// Find the first matching row or append a new one
    fn search_context_attribute_table(
        &self,
        table: &mut AttributeTable,
        func: MediaFunction,
        requirement: &ScalabilityOption,
    ) -> Result<(usize, bool)> {
        for (index, row) in table.rows.iter().enumerate() {
            if row.func != func {
                continue;
            }
            let Some(scalability) = row.scalability.as_ref() else {
                mos_error!("media::MediaContext", "Row {} has no scalability state", index);
                continue;
            };
            let state = lock(scalability);
            if !state.is_scalability_mode_matched(requirement) {
                continue;
            }
            let Some(handle) = row.gpu_context else {
                mos_bail!("media::MediaContext", Unknown, "matched row {} has no GPU context", index);
            };
            self.os.set_gpu_context_from_handle(row.ctx_for_legacy_mos, handle)?;
            self.os.set_virtual_engine_state(state.virtual_engine_state());
            return Ok((index, true));
        }

        if table.rows.len() >= self.max_attribute_table_size {
            mos_bail_warn!("media::MediaContext", NotEnoughBuffer,
                "attribute table of stream {} is full ({} rows)", self.stream_id, table.rows.len());
        }

        let row = self.create_attribute(func, requirement)?;
        table.rows.push(row);
        Ok((table.rows.len() - 1, false))
    }

    /// Build the scalability state and GPU context of a new row
    ///
    /// Anything created before a failing step is torn down again.
    fn create_attribute(&self, func: MediaFunction, requirement: &ScalabilityOption) -> Result<GpuContextAttribute> {
        let scalability = self.factory.create_scalability(
            self.component_type,
            requirement,
            self.hw_interface.as_ref(),
            self.id(),
            self.os.as_ref(),
        )?;

        let (options, ve_state) = {
            let state = lock(&scalability);
            (state.gpu_ctx_create_options(), state.virtual_engine_state())
        };

        let mapped = function_to_node(func, requirement, &options, &self.os.gt_system_info())
            .and_then(|node| function_to_gpu_context(func, &options, node).map(|ctx| (node, ctx)));
        let (node, legacy) = match mapped {
            Ok(mapped) => mapped,
            Err(e) => {
                discard_scalability(&scalability);
                return Err(e);
            }
        };

        let handle = match self.backend.create_gpu_context(self.os.as_ref(), legacy, node, &options) {
            Ok(handle) => handle,
            Err(e) => {
                discard_scalability(&scalability);
                return Err(e);
            }
        };

        if let Err(e) = self.os.set_gpu_context_from_handle(legacy, handle) {
            if let Err(destroy_err) = self.backend.destroy_gpu_context(self.os.as_ref(), handle) {
                mos_warn!("media::MediaContext", "Rollback of GPU context {} failed: {}", handle, destroy_err);
            }
            discard_scalability(&scalability);
            return Err(e);
        }
        self.os.set_virtual_engine_state(ve_state);

        mos_debug!("media::MediaContext", "Stream {} created {:?} row: {:?} on {:?} as {}",
            self.stream_id, func, legacy, node, handle);

        Ok(GpuContextAttribute {
            func,
            scalability: Some(scalability),
            ctx_for_legacy_mos: legacy,
            gpu_context: Some(handle),
            node,
        })
    }

    /// Whether the current legacy context runs on the render engine
    pub fn is_render_engine_used(&self) -> bool {
        self.os
            .current_gpu_context()
            .map_or(false, LegacyGpuContext::is_render)
    }

    /// Tear down every scalability state and GPU context this media context created
    ///
    /// Best effort: failures are logged and the remaining rows are still torn
    /// down. A second call does nothing.
    pub fn destroy(&self) {
        let mut table = lock(&self.table);
        if table.destroyed {
            return;
        }
        table.destroyed = true;
        table.current = None;

        let row_count = table.rows.len();
        for (index, row) in table.rows.iter_mut().enumerate() {
            match row.scalability.take() {
                Some(scalability) => {
                    if let Err(e) = lock(&scalability).destroy() {
                        mos_error!("media::MediaContext", "Destroying scalability of row {} failed: {}", index, e);
                    }
                }
                None => mos_error!("media::MediaContext", "Row {} has no scalability state", index),
            }

            match row.gpu_context.take() {
                Some(handle) => {
                    if let Err(e) = self.backend.destroy_gpu_context(self.os.as_ref(), handle) {
                        mos_error!("media::MediaContext", "Destroying GPU context {} failed: {}", handle, e);
                    }
                    self.os.invalidate_gpu_context(row.ctx_for_legacy_mos, handle);
                }
                None => mos_error!("media::MediaContext", "Row {} has no GPU context", index),
            }
        }

        mos_debug!("media::MediaContext", "Stream {} destroyed ({} rows)", self.stream_id, row_count);
    }

    // ===== ACCESSORS =====

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// Rows in the attribute table
    pub fn attribute_count(&self) -> usize {
        lock(&self.table).rows.len()
    }

    /// Row selected by the last successful switch
    pub fn current_attribute_index(&self) -> Option<usize> {
        lock(&self.table).current
    }

    /// GPU context of row `index`
    pub fn gpu_context_handle(&self, index: usize) -> Option<GpuContextHandle> {
        lock(&self.table).rows.get(index).and_then(|row| row.gpu_context)
    }

    /// Legacy identifier of row `index`
    pub fn legacy_context(&self, index: usize) -> Option<LegacyGpuContext> {
        lock(&self.table).rows.get(index).map(|row| row.ctx_for_legacy_mos)
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.table).destroyed
    }

    pub fn os_interface(&self) -> &Arc<dyn OsInterface> {
        &self.os
    }
}

impl Drop for MediaContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn discard_scalability(scalability: &SharedScalability) {
    if let Err(e) = lock(scalability).destroy() {
        mos_warn!("media::MediaContext", "Discarding scalability state failed: {}", e);
    }
}

#[cfg(test)]
#[path = "media_context_tests.rs"]
mod tests;
