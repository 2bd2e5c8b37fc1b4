/// Single-pipe scalability state

use crate::error::Result;
use crate::os::{GpuContextCreateOptions, VirtualEngineState};
use crate::scalability::{ComponentType, MediaContextId, MediaScalability, ScalabilityOption};
use crate::{mos_bail, mos_trace};

/// Workload runs on one engine instance
pub struct MediaScalabilitySinglePipe {
    option: ScalabilityOption,
    owner: MediaContextId,
    create_options: GpuContextCreateOptions,
    destroyed: bool,
}

impl MediaScalabilitySinglePipe {
    pub fn new(component_type: ComponentType, option: &ScalabilityOption, owner: MediaContextId) -> Result<Self> {
        if option.is_multi_pipe() {
            mos_bail!("media::Scalability", InvalidParameter,
                "single-pipe state cannot serve {} pipes", option.num_pipe);
        }

        let create_options = GpuContextCreateOptions {
            lrca_count: 1,
            using_sfc: option.using_sfc && component_type == ComponentType::Decode,
            using_virtual_engine: option.using_virtual_engine,
            ..GpuContextCreateOptions::default()
        };

        mos_trace!("media::Scalability", "Single-pipe state for {:?} stream {}",
            owner.component_type, owner.stream_id);

        Ok(Self {
            option: *option,
            owner,
            create_options,
            destroyed: false,
        })
    }

    pub fn owner(&self) -> MediaContextId {
        self.owner
    }
}

impl MediaScalability for MediaScalabilitySinglePipe {
    fn is_scalability_mode_matched(&self, requirement: &ScalabilityOption) -> bool {
        !self.destroyed && self.option.is_matched(requirement)
    }

    fn gpu_ctx_create_options(&self) -> GpuContextCreateOptions {
        self.create_options.clone()
    }

    fn virtual_engine_state(&self) -> Option<VirtualEngineState> {
        if self.option.using_virtual_engine {
            Some(VirtualEngineState {
                scalability_enabled: false,
                pipe_count: 1,
                engine_instances: Vec::new(),
            })
        } else {
            None
        }
    }

    fn pipe_num(&self) -> u8 {
        1
    }

    fn option(&self) -> &ScalabilityOption {
        &self.option
    }

    fn destroy(&mut self) -> Result<()> {
        self.destroyed = true;
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
