/// Media functions and their mapping to GPU nodes and legacy contexts
///
/// A media function names the kind of work a pipeline submits. Each function
/// maps first to the engine class (node) it runs on, then, together with the
/// context creation options produced by the scalability state, to the legacy
/// context identifier the work is published under.

use crate::error::{Error, Result};
use crate::os::{GpuContextCreateOptions, GpuNode, GtSystemInfo, LegacyGpuContext};
use crate::scalability::ScalabilityOption;
use crate::mos_bail_warn;

/// Kind of work submitted through a media context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFunction {
    RenderGeneric,
    VdboxEncode,
    VdboxDecode,
    VdboxCp,
    VeboxVpp,
    ComputeMdf,
    ComputeVpp,
    VdboxDecodeWa,
    VdboxDecrypt,
}

impl MediaFunction {
    pub const ALL: [MediaFunction; 9] = [
        MediaFunction::RenderGeneric,
        MediaFunction::VdboxEncode,
        MediaFunction::VdboxDecode,
        MediaFunction::VdboxCp,
        MediaFunction::VeboxVpp,
        MediaFunction::ComputeMdf,
        MediaFunction::ComputeVpp,
        MediaFunction::VdboxDecodeWa,
        MediaFunction::VdboxDecrypt,
    ];

    /// Functions executed by a VDBOX
    pub fn is_vdbox(self) -> bool {
        matches!(
            self,
            MediaFunction::VdboxEncode
                | MediaFunction::VdboxDecode
                | MediaFunction::VdboxCp
                | MediaFunction::VdboxDecodeWa
                | MediaFunction::VdboxDecrypt
        )
    }

    pub fn is_compute(self) -> bool {
        matches!(self, MediaFunction::ComputeMdf | MediaFunction::ComputeVpp)
    }
}

impl TryFrom<u32> for MediaFunction {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| Error::InvalidParameter(format!("media function {} out of range", value)))
    }
}

// ============================================================================
// Node mapping
// ============================================================================

/// Engine class `func` runs on
///
/// # Errors
///
/// NotSupported when the GT exposes no engine of the required class, or when
/// the creation options force a node of the wrong class.
pub fn function_to_node(
    func: MediaFunction,
    requirement: &ScalabilityOption,
    options: &GpuContextCreateOptions,
    gt: &GtSystemInfo,
) -> Result<GpuNode> {
    if func.is_vdbox() && gt.vdbox_count == 0 {
        mos_bail_warn!("media::MediaFunction", NotSupported, "{:?} needs a VDBOX, none present", func);
    }
    if func == MediaFunction::VeboxVpp && gt.vebox_count == 0 {
        mos_bail_warn!("media::MediaFunction", NotSupported, "{:?} needs a VEBOX, none present", func);
    }
    if func.is_compute() && !gt.compute_engine_supported {
        mos_bail_warn!("media::MediaFunction", NotSupported,
            "{:?} needs a compute engine, none present", func);
    }

    let node = match func {
        MediaFunction::RenderGeneric => GpuNode::Render3D,
        MediaFunction::VdboxDecode => function_to_node_decode(requirement, gt),
        MediaFunction::VdboxEncode
        | MediaFunction::VdboxCp
        | MediaFunction::VdboxDecrypt
        | MediaFunction::VdboxDecodeWa => GpuNode::Video,
        MediaFunction::VeboxVpp => GpuNode::Vebox,
        MediaFunction::ComputeMdf | MediaFunction::ComputeVpp => GpuNode::Compute,
    };

    match options.gpu_node {
        None => Ok(node),
        Some(forced) if forced == node || (forced.is_video() && node.is_video()) => Ok(forced),
        Some(forced) => mos_bail_warn!("media::MediaFunction", NotSupported,
            "{:?} cannot run on forced node {:?}", func, forced),
    }
}

/// Decode node selection
///
/// The secondary VDBOX is only picked when the decode explicitly prefers it,
/// the GT has one, and the work is neither SFC nor virtual-engine balanced.
pub fn function_to_node_decode(requirement: &ScalabilityOption, gt: &GtSystemInfo) -> GpuNode {
    if gt.vdbox_count >= 2
        && requirement.prefer_secondary_vdbox
        && !requirement.using_sfc
        && !requirement.using_virtual_engine
    {
        GpuNode::Video2
    } else {
        GpuNode::Video
    }
}

// ============================================================================
// Legacy context mapping
// ============================================================================

/// Legacy context identifier `func` is published under on `node`
pub fn function_to_gpu_context(
    func: MediaFunction,
    options: &GpuContextCreateOptions,
    node: GpuNode,
) -> Result<LegacyGpuContext> {
    let ctx = match func {
        MediaFunction::RenderGeneric => LegacyGpuContext::Render,
        MediaFunction::VdboxEncode => function_to_gpu_context_encode(options.lrca_count),
        MediaFunction::VdboxDecode => {
            function_to_gpu_context_decode(options.using_sfc, options.lrca_count, node)
        }
        MediaFunction::VdboxCp | MediaFunction::VdboxDecrypt => LegacyGpuContext::Video,
        MediaFunction::VdboxDecodeWa => LegacyGpuContext::Video2,
        MediaFunction::VeboxVpp => LegacyGpuContext::Vebox,
        MediaFunction::ComputeMdf => LegacyGpuContext::CmCompute,
        MediaFunction::ComputeVpp => LegacyGpuContext::Compute,
    };

    if ctx.node() != node && !(ctx.is_video() && node.is_video()) {
        mos_bail_warn!("media::MediaFunction", NotSupported,
            "{:?} maps to {:?}, which does not run on {:?}", func, ctx, node);
    }
    Ok(ctx)
}

/// Encode: by parallel submission lane count
pub fn function_to_gpu_context_encode(lane_count: u8) -> LegacyGpuContext {
    match lane_count {
        0 | 1 => LegacyGpuContext::Video3,
        2 => LegacyGpuContext::Video6,
        // no dedicated 4-lane identifier yet
        4 => LegacyGpuContext::Video6,
        _ => LegacyGpuContext::Video3,
    }
}

/// Decode: SFC output first, then lane count
pub fn function_to_gpu_context_decode(using_sfc: bool, lane_count: u8, node: GpuNode) -> LegacyGpuContext {
    if using_sfc {
        return LegacyGpuContext::Video4;
    }
    match lane_count {
        0 | 1 if node == GpuNode::Video => LegacyGpuContext::Video,
        0 | 1 => LegacyGpuContext::Vdbox2Video,
        2 => LegacyGpuContext::Video5,
        3 => LegacyGpuContext::Video7,
        _ => LegacyGpuContext::Video,
    }
}

#[cfg(test)]
#[path = "media_function_tests.rs"]
mod tests;
