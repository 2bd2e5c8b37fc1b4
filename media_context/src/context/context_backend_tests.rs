/// Tests for the handle and legacy context backends

use super::*;
use crate::error::Error;
use crate::os::mock_os_interface::MockOsInterface;

#[test]
fn test_handle_backend_goes_through_os() {
    let os = MockOsInterface::new();
    let backend = HandleContextBackend;

    let handle = backend
        .create_gpu_context(&os, LegacyGpuContext::Video, GpuNode::Video, &GpuContextCreateOptions::default())
        .unwrap();
    assert!(os.calls().contains(&"create_gpu_context(Video, Video)".to_string()));
    assert_eq!(os.gpu_context_mgr.gpu_context_number(), 1);

    backend.destroy_gpu_context(&os, handle).unwrap();
    assert!(os.calls().contains(&format!("destroy_gpu_context_by_handle({})", handle)));
    assert_eq!(os.gpu_context_mgr.gpu_context_number(), 0);
}

#[test]
fn test_legacy_backend_uses_mgr_directly() {
    let os = MockOsInterface::new();
    let backend = LegacyContextBackend::from_os(&os).unwrap();

    let handle = backend
        .create_gpu_context(&os, LegacyGpuContext::Vebox, GpuNode::Vebox, &GpuContextCreateOptions::default())
        .unwrap();
    assert!(os.calls().is_empty());

    let ctx = backend.gpu_context_mgr().get_gpu_context(handle).unwrap();
    assert_eq!(ctx.legacy(), Some(LegacyGpuContext::Vebox));

    backend.destroy_gpu_context(&os, handle).unwrap();
    assert!(ctx.is_destroyed());
    assert!(os.calls().is_empty());
}

#[test]
fn test_legacy_backend_destroy_unknown_handle_fails() {
    let os = MockOsInterface::new();
    let backend = LegacyContextBackend::from_os(&os).unwrap();
    let result = backend.destroy_gpu_context(&os, GpuContextHandle(5));
    assert!(matches!(result, Err(Error::Unknown(_))));
}

#[test]
fn test_backend_names() {
    let os = MockOsInterface::new();
    assert_eq!(HandleContextBackend.name(), "handle");
    assert_eq!(LegacyContextBackend::from_os(&os).unwrap().name(), "legacy");
}
