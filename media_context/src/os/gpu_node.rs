/// GPU nodes, legacy context identifiers and context handles

use std::fmt;
use crate::error::{Error, Result};

/// Handle of a GPU context inside its GpuContextMgr arena
///
/// The handle is the arena index: cheap to copy and stable for the lifetime
/// of the context it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuContextHandle(pub u32);

impl GpuContextHandle {
    /// Arena index addressed by this handle
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GpuContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hardware engine class a context executes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuNode {
    /// Render (3D) engine
    Render3D,
    /// Compute engine
    Compute,
    /// Video enhancement (VEBOX) engine
    Vebox,
    /// Primary video (VDBOX) engine
    Video,
    /// Secondary video (VDBOX) engine
    Video2,
    /// Blitter engine
    Blt,
}

impl GpuNode {
    /// Whether this is one of the video (VDBOX) nodes
    pub fn is_video(self) -> bool {
        matches!(self, GpuNode::Video | GpuNode::Video2)
    }
}

/// Pre-refactor fixed GPU context identifiers
///
/// Legacy callers still address contexts through these; the media context
/// keeps each one bound to the handle of the context that currently serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LegacyGpuContext {
    Render,
    Render2,
    Render3,
    Render4,
    Video,
    Video2,
    Video3,
    Video4,
    Vdbox2Video,
    Vdbox2Video2,
    Vdbox2Video3,
    Vebox,
    Video5,
    Video6,
    Video7,
    Blt,
    Compute,
    CmCompute,
}

impl LegacyGpuContext {
    /// Every legacy identifier, in declaration order
    pub const ALL: [LegacyGpuContext; 18] = [
        LegacyGpuContext::Render,
        LegacyGpuContext::Render2,
        LegacyGpuContext::Render3,
        LegacyGpuContext::Render4,
        LegacyGpuContext::Video,
        LegacyGpuContext::Video2,
        LegacyGpuContext::Video3,
        LegacyGpuContext::Video4,
        LegacyGpuContext::Vdbox2Video,
        LegacyGpuContext::Vdbox2Video2,
        LegacyGpuContext::Vdbox2Video3,
        LegacyGpuContext::Vebox,
        LegacyGpuContext::Video5,
        LegacyGpuContext::Video6,
        LegacyGpuContext::Video7,
        LegacyGpuContext::Blt,
        LegacyGpuContext::Compute,
        LegacyGpuContext::CmCompute,
    ];

    /// Node a legacy context executes on
    pub fn node(self) -> GpuNode {
        match self {
            LegacyGpuContext::Render
            | LegacyGpuContext::Render2
            | LegacyGpuContext::Render3
            | LegacyGpuContext::Render4 => GpuNode::Render3D,
            LegacyGpuContext::Compute | LegacyGpuContext::CmCompute => GpuNode::Compute,
            LegacyGpuContext::Vebox => GpuNode::Vebox,
            LegacyGpuContext::Video
            | LegacyGpuContext::Video2
            | LegacyGpuContext::Video3
            | LegacyGpuContext::Video4
            | LegacyGpuContext::Video5
            | LegacyGpuContext::Video6
            | LegacyGpuContext::Video7 => GpuNode::Video,
            LegacyGpuContext::Vdbox2Video
            | LegacyGpuContext::Vdbox2Video2
            | LegacyGpuContext::Vdbox2Video3 => GpuNode::Video2,
            LegacyGpuContext::Blt => GpuNode::Blt,
        }
    }

    /// Render-class (RCS) contexts: render and compute
    pub fn is_render(self) -> bool {
        matches!(
            self,
            LegacyGpuContext::Render
                | LegacyGpuContext::Render2
                | LegacyGpuContext::Render3
                | LegacyGpuContext::Render4
                | LegacyGpuContext::Compute
                | LegacyGpuContext::CmCompute
        )
    }

    /// Video-class (VCS) contexts
    pub fn is_video(self) -> bool {
        self.node().is_video()
    }

    /// Video-enhancement (VECS) contexts
    pub fn is_vebox(self) -> bool {
        matches!(self, LegacyGpuContext::Vebox)
    }
}

/// GT topology reported by the OS layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GtSystemInfo {
    /// Number of VDBOX (video) engines
    pub vdbox_count: u32,
    /// Number of VEBOX engines
    pub vebox_count: u32,
    /// Whether a dedicated compute engine is exposed
    pub compute_engine_supported: bool,
    /// Slice count, passed through in SSEU creation options
    pub slice_count: u8,
    /// Subslices per slice
    pub sub_slice_count: u8,
}

impl Default for GtSystemInfo {
    fn default() -> Self {
        Self {
            vdbox_count: 2,
            vebox_count: 1,
            compute_engine_supported: true,
            slice_count: 1,
            sub_slice_count: 6,
        }
    }
}

impl TryFrom<u32> for LegacyGpuContext {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| Error::InvalidParameter(format!("legacy GPU context {} out of range", value)))
    }
}
