/// Default scalability factory
///
/// Picks the single-pipe state for single-pipe requirements and the
/// multi-pipe state otherwise. Only the video codecs can split a workload.

use std::sync::{Arc, Mutex};
use crate::error::Result;
use crate::os::OsInterface;
use crate::scalability::{
    ComponentType, HwInterface, MediaContextId, MediaScalabilityMultiPipe,
    MediaScalabilitySinglePipe, ScalabilityFactory, ScalabilityOption, SharedScalability,
    MAX_PIPE_NUM,
};
use crate::mos_bail;

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultScalabilityFactory;

impl DefaultScalabilityFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ScalabilityFactory for DefaultScalabilityFactory {
    fn create_scalability(
        &self,
        component_type: ComponentType,
        requirement: &ScalabilityOption,
        hw_interface: Option<&Arc<dyn HwInterface>>,
        media_context: MediaContextId,
        os: &dyn OsInterface,
    ) -> Result<SharedScalability> {
        requirement.validate()?;

        if !requirement.is_multi_pipe() {
            let state = MediaScalabilitySinglePipe::new(component_type, requirement, media_context)?;
            return Ok(Arc::new(Mutex::new(state)));
        }

        if !matches!(component_type, ComponentType::Decode | ComponentType::Encode) {
            mos_bail!("media::ScalabilityFactory", NotSupported,
                "{:?} cannot run on {} pipes", component_type, requirement.num_pipe);
        }

        // Without a HW interface the VDBOX count bounds the pipes
        let max_pipe_num = match hw_interface {
            Some(hw) => hw.max_pipe_num(),
            None => os.gt_system_info().vdbox_count.min(MAX_PIPE_NUM as u32) as u8,
        };

        let state = MediaScalabilityMultiPipe::new(component_type, requirement, max_pipe_num, media_context)?;
        Ok(Arc::new(Mutex::new(state)))
    }
}
