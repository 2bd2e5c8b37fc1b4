/// Scalability option, state trait and factory trait
///
/// A scalability state describes how one workload is spread over engine
/// instances. The media context keeps one per attribute-table row and asks it
/// whether a new requirement can reuse the row.

use std::sync::{Arc, Mutex};
use crate::error::{Error, Result};
use crate::os::{GpuContextCreateOptions, OsInterface, VirtualEngineState};
use crate::mos_bail;

/// Most pipes (VDBOX instances) one workload can be split across
pub const MAX_PIPE_NUM: u8 = 4;

/// Component a media context serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Unknown,
    Decode,
    Encode,
    Vp,
    Cp,
    Cm,
}

impl TryFrom<u32> for ComponentType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(ComponentType::Unknown),
            1 => Ok(ComponentType::Decode),
            2 => Ok(ComponentType::Encode),
            3 => Ok(ComponentType::Vp),
            4 => Ok(ComponentType::Cp),
            5 => Ok(ComponentType::Cm),
            _ => Err(Error::InvalidParameter(format!("component type {} out of range", value))),
        }
    }
}

/// Scalability requirement of one frame
///
/// Two requirements that match structurally may share a GPU context; the
/// ENC/PAK flags only select which legacy binding the context is published as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScalabilityOption {
    /// Pipes (parallel submission lanes); 0 and 1 both mean single pipe
    pub num_pipe: u8,
    /// Tile columns/rows split the frame is encoded or decoded with
    pub num_tiles: u32,
    /// Let the kernel balance work across engine instances
    pub using_virtual_engine: bool,
    /// Decode writes through the SFC
    pub using_sfc: bool,
    /// Decode prefers the secondary VDBOX when one exists
    pub prefer_secondary_vdbox: bool,
    /// Encode uses VDENC
    pub vdenc_enabled: bool,
    /// Publish the context as the encoder ENC context
    pub is_enc: bool,
    /// Publish the context as the encoder PAK context
    pub is_pak: bool,
}

impl ScalabilityOption {
    /// Single-pipe requirement with default flags
    pub fn single_pipe() -> Self {
        Self {
            num_pipe: 1,
            ..Self::default()
        }
    }

    /// Requirement split across `num_pipe` pipes
    pub fn multi_pipe(num_pipe: u8) -> Self {
        Self {
            num_pipe,
            using_virtual_engine: true,
            ..Self::default()
        }
    }

    /// Effective pipe count (at least 1)
    pub fn pipe_count(&self) -> u8 {
        self.num_pipe.max(1)
    }

    pub fn is_multi_pipe(&self) -> bool {
        self.pipe_count() > 1
    }

    /// Reject requirements no engine topology can serve
    pub fn validate(&self) -> Result<()> {
        if self.num_pipe > MAX_PIPE_NUM {
            mos_bail!("media::Scalability", InvalidParameter,
                "{} pipes requested, at most {} supported", self.num_pipe, MAX_PIPE_NUM);
        }
        if self.using_sfc && self.is_multi_pipe() {
            mos_bail!("media::Scalability", InvalidParameter,
                "SFC output cannot be combined with {} pipes", self.num_pipe);
        }
        Ok(())
    }

    /// Whether a context built for `self` can serve `other`
    pub fn is_matched(&self, other: &ScalabilityOption) -> bool {
        self.pipe_count() == other.pipe_count()
            && self.num_tiles == other.num_tiles
            && self.using_virtual_engine == other.using_virtual_engine
            && self.using_sfc == other.using_sfc
            && self.prefer_secondary_vdbox == other.prefer_secondary_vdbox
            && self.vdenc_enabled == other.vdenc_enabled
    }
}

/// Opaque hardware interface handed through to scalability construction
pub trait HwInterface: Send + Sync {
    /// Most pipes the hardware can run one workload on
    fn max_pipe_num(&self) -> u8;
}

/// Identity of the media context a scalability state belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaContextId {
    pub component_type: ComponentType,
    pub stream_id: u32,
}

/// Scalability state owned by one attribute-table row
pub trait MediaScalability: Send {
    /// Whether this state can serve `requirement` (the reuse predicate)
    fn is_scalability_mode_matched(&self, requirement: &ScalabilityOption) -> bool;

    /// Options the GPU context for this state is created with
    fn gpu_ctx_create_options(&self) -> GpuContextCreateOptions;

    /// Virtual-engine state published on every switch to this row
    fn virtual_engine_state(&self) -> Option<VirtualEngineState>;

    /// Pipes in use
    fn pipe_num(&self) -> u8;

    /// Requirement this state was built for
    fn option(&self) -> &ScalabilityOption;

    /// Release everything the state owns; a second call is a no-op
    fn destroy(&mut self) -> Result<()>;

    fn is_destroyed(&self) -> bool;
}

/// Scalability state shared between the table and the caller of a switch
pub type SharedScalability = Arc<Mutex<dyn MediaScalability>>;

/// Builds scalability states for a media context
pub trait ScalabilityFactory: Send + Sync {
    fn create_scalability(
        &self,
        component_type: ComponentType,
        requirement: &ScalabilityOption,
        hw_interface: Option<&Arc<dyn HwInterface>>,
        media_context: MediaContextId,
        os: &dyn OsInterface,
    ) -> Result<SharedScalability>;
}

#[cfg(test)]
#[path = "media_scalability_tests.rs"]
mod tests;
