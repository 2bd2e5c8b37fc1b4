//! Integration tests for MediaContext over the null OS backend
//!
//! Full sessions: switch, write commands, submit, tear down. Checks that
//! rows, GPU contexts and command buffers are shared and released the way a
//! long-running decode or encode session relies on.

use std::sync::Arc;
use std::thread;
use media_context::media::context::{
    GpuContextBackend, HandleContextBackend, LegacyContextBackend, MediaFunction,
};
use media_context::media::os::{
    GpuNode, GtSystemInfo, LegacyGpuContext, OsInterface, SubmissionType,
};
use media_context::media::scalability::{
    ComponentType, DefaultScalabilityFactory, ScalabilityOption,
};
use media_context::media::{ContextConfig, Error, MediaContext};
use media_context_null::NullOsInterface;

// ============================================================================
// HELPERS
// ============================================================================

fn null_os(gt: GtSystemInfo, config: &ContextConfig) -> Arc<NullOsInterface> {
    Arc::new(NullOsInterface::with_gt(gt, config.clone()).unwrap())
}

fn media_context(
    component: ComponentType,
    os: &Arc<NullOsInterface>,
    backend: Box<dyn GpuContextBackend>,
    config: &ContextConfig,
) -> MediaContext {
    MediaContext::new(
        component,
        os.clone(),
        None,
        backend,
        Arc::new(DefaultScalabilityFactory::new()),
        config,
    )
    .unwrap()
}

fn quad_vdbox() -> GtSystemInfo {
    GtSystemInfo {
        vdbox_count: 4,
        ..GtSystemInfo::default()
    }
}

// ============================================================================
// SESSION TESTS
// ============================================================================

#[test]
fn test_decode_session_reuses_row_every_frame() {
    let config = ContextConfig::default();
    let os = null_os(GtSystemInfo::default(), &config);
    let ctx = media_context(ComponentType::Decode, &os, Box::new(HandleContextBackend), &config);
    let mgr = os.gpu_context_mgr().unwrap();

    let mut first_handle = None;
    for frame in 0..5u32 {
        let switched = ctx
            .switch_context(MediaFunction::VdboxDecode, &ScalabilityOption::single_pipe())
            .unwrap();
        assert_eq!(switched.reused, frame > 0);
        assert_eq!(switched.node, GpuNode::Video);
        first_handle.get_or_insert(switched.gpu_context);
        assert_eq!(Some(switched.gpu_context), first_handle);

        let gpu = mgr.get_gpu_context(switched.gpu_context).unwrap();
        let mut view = gpu.get_command_buffer(0).unwrap();
        view.add_dwords(&[0x7000_0000 | frame, 0]).unwrap();
        gpu.return_command_buffer(&view, 0).unwrap();
        gpu.submit_command_buffer(os.as_ref(), &view, false).unwrap();
    }

    assert_eq!(ctx.attribute_count(), 1);
    assert_eq!(mgr.gpu_context_number(), 1);
    assert_eq!(os.submission_count(), 5);
    assert_eq!(os.reset_count(), 5);
    assert!(os
        .submissions()
        .iter()
        .all(|s| s.used_bytes == 8 && s.submission_type == SubmissionType::SinglePipe));
}

#[test]
fn test_scalable_encode_submits_as_multi_pipe_master() {
    let config = ContextConfig::default();
    let os = null_os(quad_vdbox(), &config);
    let ctx = media_context(ComponentType::Encode, &os, Box::new(HandleContextBackend), &config);

    let switched = ctx
        .switch_context(MediaFunction::VdboxEncode, &ScalabilityOption::multi_pipe(2))
        .unwrap();
    assert_eq!(switched.legacy, LegacyGpuContext::Video6);

    let ve = os.virtual_engine_state().unwrap();
    assert!(ve.scalability_enabled);
    assert_eq!(ve.pipe_count, 2);

    let gpu = os.gpu_context_mgr().unwrap().get_gpu_context(switched.gpu_context).unwrap();
    let primary = gpu.get_command_buffer(0).unwrap();
    for pipe in 1..=2u32 {
        let mut secondary = gpu.get_command_buffer(pipe).unwrap();
        assert!(!secondary.is_primary());
        secondary.vdbox_node_index = Some(pipe as u8 - 1);
        secondary.add_dwords(&[pipe, 0]).unwrap();
        gpu.return_command_buffer(&secondary, pipe).unwrap();
    }
    gpu.submit_command_buffer(os.as_ref(), &primary, false).unwrap();

    let records = os.submissions();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].submission_type, SubmissionType::MultiPipeMaster);
    assert_eq!(records[0].secondary_buffers.len(), 2);
}

#[test]
fn test_encode_enc_and_pak_bindings() {
    let config = ContextConfig::default();
    let os = null_os(GtSystemInfo::default(), &config);
    let ctx = media_context(ComponentType::Encode, &os, Box::new(HandleContextBackend), &config);

    let enc = ScalabilityOption {
        is_enc: true,
        ..ScalabilityOption::single_pipe()
    };
    let switched = ctx.switch_context(MediaFunction::VdboxEncode, &enc).unwrap();
    assert_eq!(os.enc_context(), Some(switched.legacy));
    assert_eq!(os.pak_context(), None);

    let pak = ScalabilityOption {
        is_pak: true,
        ..ScalabilityOption::single_pipe()
    };
    let again = ctx.switch_context(MediaFunction::VdboxEncode, &pak).unwrap();
    assert!(again.reused);
    assert_eq!(os.pak_context(), Some(switched.legacy));
}

#[test]
fn test_vpp_session_moves_between_engines() {
    let config = ContextConfig::default();
    let os = null_os(GtSystemInfo::default(), &config);
    let ctx = media_context(ComponentType::Vp, &os, Box::new(HandleContextBackend), &config);
    let req = ScalabilityOption::single_pipe();

    let vebox = ctx.switch_context(MediaFunction::VeboxVpp, &req).unwrap();
    assert_eq!(vebox.node, GpuNode::Vebox);
    assert_eq!(os.current_gpu_context(), Some(LegacyGpuContext::Vebox));
    assert!(!ctx.is_render_engine_used());

    let render = ctx.switch_context(MediaFunction::RenderGeneric, &req).unwrap();
    assert_eq!(render.node, GpuNode::Render3D);
    assert!(ctx.is_render_engine_used());

    let back = ctx.switch_context(MediaFunction::VeboxVpp, &req).unwrap();
    assert!(back.reused);
    assert_eq!(back.gpu_context, vebox.gpu_context);
    assert_eq!(os.current_gpu_context_handle(), Some(vebox.gpu_context));
}

#[test]
fn test_vebox_missing_is_not_supported() {
    let config = ContextConfig::default();
    let gt = GtSystemInfo {
        vebox_count: 0,
        ..GtSystemInfo::default()
    };
    let os = null_os(gt, &config);
    let ctx = media_context(ComponentType::Vp, &os, Box::new(HandleContextBackend), &config);

    let result = ctx.switch_context(MediaFunction::VeboxVpp, &ScalabilityOption::single_pipe());
    assert!(matches!(result, Err(Error::NotSupported(_))));
    assert_eq!(ctx.attribute_count(), 0);
    assert_eq!(os.gpu_context_mgr().unwrap().gpu_context_number(), 0);
}

// ============================================================================
// TEARDOWN TESTS
// ============================================================================

#[test]
fn test_destroy_releases_contexts_and_bindings() {
    let config = ContextConfig::default();
    let os = null_os(GtSystemInfo::default(), &config);
    let mgr = os.gpu_context_mgr().unwrap();
    {
        let ctx = media_context(ComponentType::Vp, &os, Box::new(HandleContextBackend), &config);
        let req = ScalabilityOption::single_pipe();
        ctx.switch_context(MediaFunction::VeboxVpp, &req).unwrap();
        ctx.switch_context(MediaFunction::RenderGeneric, &req).unwrap();
        assert_eq!(mgr.gpu_context_number(), 2);
    }
    assert_eq!(mgr.gpu_context_number(), 0);
    assert_eq!(os.binding(LegacyGpuContext::Vebox), None);
    assert_eq!(os.binding(LegacyGpuContext::Render), None);
    assert_eq!(os.current_gpu_context(), None);
}

#[test]
fn test_legacy_backend_session() {
    let config = ContextConfig::default();
    let os = null_os(GtSystemInfo::default(), &config);
    let backend = LegacyContextBackend::from_os(os.as_ref()).unwrap();
    let mgr = Arc::clone(backend.gpu_context_mgr());
    let ctx = media_context(ComponentType::Decode, &os, Box::new(backend), &config);

    let switched = ctx
        .switch_context(MediaFunction::VdboxDecode, &ScalabilityOption::single_pipe())
        .unwrap();
    let gpu = mgr.get_gpu_context(switched.gpu_context).unwrap();
    assert_eq!(gpu.legacy(), Some(switched.legacy));

    ctx.destroy();
    assert!(gpu.is_destroyed());
    assert_eq!(mgr.gpu_context_number(), 0);
}

#[test]
fn test_command_buffers_return_to_pool_after_teardown() {
    let config = ContextConfig {
        command_buffer_size: 4096,
        max_cmd_buf_num: 2,
        initial_command_buffers: 0,
        ..ContextConfig::default()
    };
    let os = null_os(GtSystemInfo::default(), &config);
    let cbm = os.cmd_buf_mgr().unwrap();
    {
        let ctx = media_context(ComponentType::Decode, &os, Box::new(HandleContextBackend), &config);
        let switched = ctx
            .switch_context(MediaFunction::VdboxDecode, &ScalabilityOption::single_pipe())
            .unwrap();
        let gpu = os.gpu_context_mgr().unwrap().get_gpu_context(switched.gpu_context).unwrap();
        for _ in 0..3 {
            let view = gpu.get_command_buffer(0).unwrap();
            gpu.submit_command_buffer(os.as_ref(), &view, false).unwrap();
        }
        assert_eq!(gpu.ring_len(), 2);
        assert_eq!(cbm.in_use_count(), 2);
    }
    assert_eq!(cbm.in_use_count(), 0);
    assert_eq!(cbm.available_count(), cbm.total_count());
}

// ============================================================================
// SHARING AND CONCURRENCY TESTS
// ============================================================================

#[test]
fn test_sessions_share_contexts_once_manager_is_full() {
    let config = ContextConfig {
        max_gpu_contexts: 1,
        ..ContextConfig::default()
    };
    let os = null_os(GtSystemInfo::default(), &config);
    let mgr = os.gpu_context_mgr().unwrap();
    let req = ScalabilityOption::single_pipe();

    let first = media_context(ComponentType::Decode, &os, Box::new(HandleContextBackend), &config);
    let second = media_context(ComponentType::Decode, &os, Box::new(HandleContextBackend), &config);
    let a = first.switch_context(MediaFunction::VdboxDecode, &req).unwrap();
    let b = second.switch_context(MediaFunction::VdboxDecode, &req).unwrap();

    assert_eq!(a.gpu_context, b.gpu_context);
    assert_eq!(mgr.gpu_context_number(), 1);
    assert_eq!(mgr.user_count(a.gpu_context), 2);

    drop(first);
    assert_eq!(mgr.user_count(b.gpu_context), 1);
    assert!(mgr.get_gpu_context(b.gpu_context).is_some());

    drop(second);
    assert_eq!(mgr.gpu_context_number(), 0);
}

#[test]
fn test_full_manager_keeps_scalable_encode_off_single_pipe_context() {
    let config = ContextConfig {
        max_gpu_contexts: 1,
        ..ContextConfig::default()
    };
    let os = null_os(quad_vdbox(), &config);
    let mgr = os.gpu_context_mgr().unwrap();
    let ctx = media_context(ComponentType::Encode, &os, Box::new(HandleContextBackend), &config);

    let single = ctx
        .switch_context(MediaFunction::VdboxEncode, &ScalabilityOption::single_pipe())
        .unwrap();
    assert_eq!(single.legacy, LegacyGpuContext::Video3);

    let result = ctx.switch_context(MediaFunction::VdboxEncode, &ScalabilityOption::multi_pipe(4));
    assert!(matches!(result, Err(Error::NotEnoughBuffer(_))));
    assert_eq!(ctx.attribute_count(), 1);
    assert_eq!(mgr.gpu_context_number(), 1);
    assert_eq!(mgr.user_count(single.gpu_context), 1);
    assert_eq!(os.binding(LegacyGpuContext::Video6), None);
    assert_eq!(os.binding(LegacyGpuContext::Video3), Some(single.gpu_context));

    let gpu = mgr.get_gpu_context(single.gpu_context).unwrap();
    assert_eq!(gpu.create_options().lane_count(), 1);
}

#[test]
fn test_parallel_sessions_on_one_device() {
    let config = ContextConfig::default();
    let os = null_os(quad_vdbox(), &config);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let os = Arc::clone(&os);
            let config = config.clone();
            thread::spawn(move || {
                let ctx = media_context(ComponentType::Decode, &os, Box::new(HandleContextBackend), &config);
                let mgr = os.gpu_context_mgr().unwrap();
                for frame in 0..10u32 {
                    let switched = ctx
                        .switch_context(MediaFunction::VdboxDecode, &ScalabilityOption::single_pipe())
                        .unwrap();
                    let gpu = mgr.get_gpu_context(switched.gpu_context).unwrap();
                    let mut view = gpu.get_command_buffer(0).unwrap();
                    view.add_dwords(&[i, frame]).unwrap();
                    gpu.return_command_buffer(&view, 0).unwrap();
                    gpu.submit_command_buffer(os.as_ref(), &view, false).unwrap();
                }
                ctx.attribute_count()
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), 1);
    }
    assert_eq!(os.submission_count(), 40);
    assert_eq!(os.gpu_context_mgr().unwrap().gpu_context_number(), 0);
}
