use super::*;
use crate::config::PreviewSettings;
use crate::device::DeviceId;
use crate::error::CameraError;
use crate::simulated::{CameraFaults, CameraProbe, ControlBlockLedger, SimulatedCameraFactory};

fn open_camera(factory: &SimulatedCameraFactory) -> Box<dyn CameraResource> {
    let ledger = ControlBlockLedger::new();
    let block = ledger.issue(DeviceId::new(0x046d, 0x085e));
    let mut camera = factory.create();
    camera.open(&block).unwrap();
    camera
}

#[test]
fn test_primary_format_accepted() {
    let factory = SimulatedCameraFactory::new();
    let mut camera = open_camera(&factory);

    let negotiated = configure_preview(camera.as_mut(), &PreviewSettings::default());
    assert_eq!(negotiated, NegotiatedFormat::Primary(PreviewFormat::hd_mjpeg()));
    assert_eq!(negotiated.format(), Some(PreviewFormat::hd_mjpeg()));
}

#[test]
fn test_fallback_on_format_rejection() {
    let factory = SimulatedCameraFactory::with_faults(CameraFaults {
        rejected_formats: vec![PreviewFormat::hd_mjpeg()],
        ..CameraFaults::default()
    });
    let mut camera = open_camera(&factory);

    let negotiated = configure_preview(camera.as_mut(), &PreviewSettings::default());
    assert_eq!(
        negotiated,
        NegotiatedFormat::Fallback(PreviewFormat::uvc_default())
    );
    assert_eq!(negotiated.to_string(), "640x480 YUYV (fallback)");
}

#[test]
fn test_unconfigured_when_both_formats_rejected() {
    let factory = SimulatedCameraFactory::with_faults(CameraFaults {
        rejected_formats: vec![PreviewFormat::hd_mjpeg(), PreviewFormat::uvc_default()],
        ..CameraFaults::default()
    });
    let mut camera = open_camera(&factory);

    let negotiated = configure_preview(camera.as_mut(), &PreviewSettings::default());
    assert_eq!(negotiated, NegotiatedFormat::Unconfigured);
    assert_eq!(negotiated.format(), None);
    assert!(factory.probe().applied_formats.lock().is_empty());
}

#[test]
fn test_non_format_error_skips_fallback() {
    let factory = SimulatedCameraFactory::new();
    // Never opened: every format call fails with NotOpen
    let mut camera = factory.create();

    let negotiated = configure_preview(camera.as_mut(), &PreviewSettings::default());
    assert_eq!(negotiated, NegotiatedFormat::Unconfigured);
    assert_eq!(
        camera.set_preview_format(&PreviewFormat::uvc_default()),
        Err(CameraError::NotOpen)
    );
}

#[test]
fn test_auto_focus_failure_is_absorbed() {
    let factory = SimulatedCameraFactory::with_faults(CameraFaults {
        auto_focus_unsupported: true,
        ..CameraFaults::default()
    });
    let mut camera = open_camera(&factory);

    let negotiated = configure_preview(camera.as_mut(), &PreviewSettings::default());
    assert_eq!(negotiated, NegotiatedFormat::Primary(PreviewFormat::hd_mjpeg()));
}

#[test]
fn test_release_is_counted_once() {
    let factory = SimulatedCameraFactory::new();
    let probe = factory.probe();
    let mut camera = open_camera(&factory);

    camera.close().unwrap();
    camera.release();
    camera.release();

    assert_eq!(CameraProbe::count(&probe.releases), 1);
    assert_eq!(CameraProbe::count(&probe.live), 0);
}

#[test]
fn test_format_display() {
    assert_eq!(PreviewFormat::hd_mjpeg().to_string(), "1280x720 MJPEG");
    assert!(PreviewFormat::new(0, 480, FrameEncoding::Yuyv).is_empty());
}
