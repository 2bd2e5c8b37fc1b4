/// Multi-pipe scalability state
///
/// Splits one workload over several VDBOX instances through parallel
/// submission lanes; the context is created with one LRCA per pipe.

use crate::error::Result;
use crate::os::{GpuContextCreateOptions, VirtualEngineState};
use crate::scalability::{ComponentType, MediaContextId, MediaScalability, ScalabilityOption};
use crate::{mos_bail, mos_debug};

/// Context creation flag requesting VDENC on every lane
pub const CREATE_FLAG_VDENC: u32 = 1 << 2;

pub struct MediaScalabilityMultiPipe {
    option: ScalabilityOption,
    owner: MediaContextId,
    pipe_num: u8,
    create_options: GpuContextCreateOptions,
    ve_state: VirtualEngineState,
    destroyed: bool,
}

impl MediaScalabilityMultiPipe {
    /// # Errors
    ///
    /// InvalidParameter when the requirement asks for more pipes than
    /// `max_pipe_num`, or for a single pipe.
    pub fn new(
        component_type: ComponentType,
        option: &ScalabilityOption,
        max_pipe_num: u8,
        owner: MediaContextId,
    ) -> Result<Self> {
        let pipe_num = option.pipe_count();
        if pipe_num < 2 {
            mos_bail!("media::Scalability", InvalidParameter,
                "multi-pipe state needs at least 2 pipes (got {})", pipe_num);
        }
        if pipe_num > max_pipe_num {
            mos_bail!("media::Scalability", InvalidParameter,
                "{} pipes exceed the {} supported by the hardware", pipe_num, max_pipe_num);
        }

        let mut create_options = GpuContextCreateOptions {
            lrca_count: pipe_num,
            using_sfc: false,
            using_virtual_engine: option.using_virtual_engine,
            ..GpuContextCreateOptions::default()
        };
        if component_type == ComponentType::Encode && option.vdenc_enabled {
            create_options.flags |= CREATE_FLAG_VDENC;
        }

        mos_debug!("media::Scalability", "{}-pipe state for {:?} stream {}",
            pipe_num, owner.component_type, owner.stream_id);

        Ok(Self {
            option: *option,
            owner,
            pipe_num,
            create_options,
            ve_state: VirtualEngineState {
                scalability_enabled: true,
                pipe_count: pipe_num,
                engine_instances: (0..pipe_num).collect(),
            },
            destroyed: false,
        })
    }

    pub fn owner(&self) -> MediaContextId {
        self.owner
    }
}

impl MediaScalability for MediaScalabilityMultiPipe {
    fn is_scalability_mode_matched(&self, requirement: &ScalabilityOption) -> bool {
        !self.destroyed && self.option.is_matched(requirement)
    }

    fn gpu_ctx_create_options(&self) -> GpuContextCreateOptions {
        self.create_options.clone()
    }

    fn virtual_engine_state(&self) -> Option<VirtualEngineState> {
        Some(self.ve_state.clone())
    }

    fn pipe_num(&self) -> u8 {
        self.pipe_num
    }

    fn option(&self) -> &ScalabilityOption {
        &self.option
    }

    fn destroy(&mut self) -> Result<()> {
        if !self.destroyed {
            self.ve_state = VirtualEngineState::default();
            self.destroyed = true;
        }
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
