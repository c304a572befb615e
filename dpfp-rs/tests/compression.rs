use std::sync::Arc;

use dpfp_rs::api::CompressionApi;
use dpfp_rs::testing::ScriptedSdk;
use dpfp_rs::{Compressor, DpfpError, FidFormat, RawImage, Status, WsqTarget};

fn compressor(sdk: &Arc<ScriptedSdk>) -> Compressor {
    let api: Arc<dyn CompressionApi> = sdk.clone();
    Compressor::new(api)
}

#[test]
fn compress_then_expand_restores_raster() {
    let sdk = ScriptedSdk::new();
    let compressor = compressor(&sdk);
    let image = RawImage::new(ScriptedSdk::pixels(40, 50, 2), 40, 50, 500, 8).unwrap();

    let wsq = compressor.compress_raw(&image, WsqTarget::default()).unwrap();
    let expanded = compressor.expand_raw(&wsq).unwrap();
    assert_eq!(expanded, image);

    let calls = sdk.calls();
    assert_eq!((calls.start_compression, calls.finish_compression), (2, 2));
}

#[test]
fn size_target_and_records() {
    let sdk = ScriptedSdk::new();
    let compressor = compressor(&sdk);
    let mut record = vec![0u8; 46];
    record.extend(ScriptedSdk::pixels(8, 8, 1));

    let target = WsqTarget::Size {
        size: 4096,
        tolerance_aw: 10,
    };
    let wsq = compressor
        .compress_fid(FidFormat::Iso19794_4_2005, &record, target)
        .unwrap();
    let restored = compressor
        .expand_fid(FidFormat::Iso19794_4_2005, &wsq)
        .unwrap();
    assert_eq!(restored, record);
}

#[test]
fn invalid_raster_never_reaches_the_library() {
    let sdk = ScriptedSdk::new();
    let compressor = compressor(&sdk);
    let image = RawImage {
        pixels: vec![0; 16],
        width: 4,
        height: 4,
        dpi: 200,
        bpp: 8,
    };

    assert!(matches!(
        compressor.compress_raw(&image, WsqTarget::default()),
        Err(DpfpError::InvalidImage(_))
    ));
    assert_eq!(sdk.calls().start_compression, 0);
}

#[test]
fn failure_mid_session_still_finishes() {
    let sdk = ScriptedSdk::new();
    let compressor = compressor(&sdk);

    let err = compressor.expand_raw(b"not wsq at all, definitely").unwrap_err();
    assert_eq!(err.status(), Some(Status::WsqFailure));

    let bad_target = WsqTarget::Bitrate {
        bitrate_x100: 0,
        tolerance_aw: 10,
    };
    let image = RawImage::new(vec![1; 16], 4, 4, 500, 8).unwrap();
    let err = compressor.compress_raw(&image, bad_target).unwrap_err();
    assert_eq!(err.status(), Some(Status::InvalidWsqParameter));

    let calls = sdk.calls();
    assert_eq!((calls.start_compression, calls.finish_compression), (2, 2));
}
