use std::sync::Arc;

use dpfp_rs::api::MatchApi;
use dpfp_rs::testing::{ScriptedSdk, SdkState};
use dpfp_rs::{
    Candidate, DpfpError, FidFormat, FingerPosition, Fmd, FmdFormat, Matcher, RawImage, Score,
    Step, Threshold,
};

fn matcher(sdk: &Arc<ScriptedSdk>) -> Matcher {
    let api: Arc<dyn MatchApi> = sdk.clone();
    Matcher::new(api)
}

fn raster(finger: u8) -> RawImage {
    RawImage::new(ScriptedSdk::pixels(40, 50, finger), 40, 50, 500, 8).unwrap()
}

fn template(matcher: &Matcher, finger: u8) -> Fmd {
    matcher
        .create_from_image(&raster(finger), FingerPosition::RightIndex, 0, FmdFormat::Ansi378_2004)
        .unwrap()
}

#[test]
fn template_compared_with_itself_scores_zero() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let fmd = template(&matcher, 1);

    assert!(fmd.as_bytes().starts_with(b"FMR"));
    assert_eq!(matcher.compare(&fmd, 0, &fmd, 0).unwrap(), Score(0));
    assert!(matcher.compare(&fmd, 0, &template(&matcher, 2), 0).unwrap() > Score(100));
}

#[test]
fn bad_geometry_is_rejected_before_the_library() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let image = RawImage {
        pixels: vec![0; 10],
        width: 4,
        height: 4,
        dpi: 500,
        bpp: 8,
    };

    let err = matcher
        .create_from_image(&image, FingerPosition::Unknown, 0, FmdFormat::Ansi378_2004)
        .unwrap_err();
    assert!(matches!(err, DpfpError::InvalidParameter(_)));
}

#[test]
fn template_from_record_matches_template_from_raster() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let mut record = vec![0u8; 46];
    record.extend(ScriptedSdk::pixels(40, 50, 4));

    let from_fid = matcher
        .create_from_fid(FidFormat::Iso19794_4_2005, &record, FmdFormat::Ansi378_2004)
        .unwrap();
    assert_eq!(from_fid, template(&matcher, 4));
}

#[test]
fn convert_changes_format() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let converted = matcher
        .convert(&template(&matcher, 1), FmdFormat::Iso19794_2_2005)
        .unwrap();
    assert_eq!(converted.format(), FmdFormat::Iso19794_2_2005);
}

#[test]
fn identify_reports_discovery_order_and_ranking_fixes_it() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let probe = template(&matcher, 7);

    let mut near = probe.as_bytes().to_vec();
    let last = near.len() - 1;
    near[last] ^= 0xFF;
    let gallery = vec![
        template(&matcher, 1),
        Fmd::new(FmdFormat::Ansi378_2004, near),
        probe.clone(),
    ];

    let candidates = matcher
        .identify(&probe, 0, &gallery, Threshold(5000), 10)
        .unwrap();
    let indices: Vec<usize> = candidates.iter().map(|c| c.fmd_index).collect();
    assert_eq!(indices, vec![1, 2]);

    let ranked = matcher
        .rank_by_score(&probe, 0, &gallery, &candidates)
        .unwrap();
    assert_eq!(ranked[0].0.fmd_index, 2);
    assert_eq!(ranked[0].1, Score(0));
    assert_eq!(ranked[1].1, Score(1000));
}

#[test]
fn identify_respects_candidate_limit() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let probe = template(&matcher, 3);
    let gallery = vec![probe.clone(), probe.clone(), probe.clone()];

    let candidates = matcher
        .identify(&probe, 0, &gallery, Threshold::default(), 2)
        .unwrap();
    assert_eq!(
        candidates,
        vec![
            Candidate {
                fmd_index: 0,
                view_index: 0
            },
            Candidate {
                fmd_index: 1,
                view_index: 0
            }
        ]
    );
    assert!(matcher
        .identify(&probe, 0, &[], Threshold::default(), 2)
        .unwrap()
        .is_empty());
}

#[test]
fn enrollment_creates_template_and_finishes_once() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let first = template(&matcher, 1);

    let enrollment = matcher.start_enrollment(FmdFormat::Ansi378_2004).unwrap();
    let enrollment = match enrollment.add(&first, 0).unwrap() {
        Step::NeedMore(enrollment) => enrollment,
        Step::Ready(_) => panic!("ready after one view"),
    };
    let mut ready = match enrollment.add(&template(&matcher, 1), 0).unwrap() {
        Step::Ready(ready) => ready,
        Step::NeedMore(_) => panic!("not ready after two views"),
    };
    assert_eq!(ready.views(), 2);

    let enrolled = ready.create_template().unwrap();
    assert_eq!(enrolled, first);
    ready.finish().unwrap();

    let calls = sdk.calls();
    assert_eq!((calls.start_enrollment, calls.finish_enrollment), (1, 1));
}

#[test]
fn abandoned_enrollment_is_finished_on_drop() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    {
        let enrollment = matcher.start_enrollment(FmdFormat::Ansi378_2004).unwrap();
        let _ = enrollment.add(&template(&matcher, 1), 0).unwrap();
    }

    let calls = sdk.calls();
    assert_eq!((calls.start_enrollment, calls.finish_enrollment), (1, 1));
    assert!(matcher.start_enrollment(FmdFormat::Ansi378_2004).is_ok());
}

#[test]
fn failed_add_finishes_enrollment() {
    let sdk = ScriptedSdk::with_state(SdkState {
        add_status: Some(dpfp_sys::DPFJ_E_FAILURE),
        ..SdkState::default()
    });
    let matcher = matcher(&sdk);

    let enrollment = matcher.start_enrollment(FmdFormat::Ansi378_2004).unwrap();
    assert!(enrollment.add(&template(&matcher, 1), 0).is_err());
    assert_eq!(sdk.calls().finish_enrollment, 1);
}

#[test]
fn only_one_enrollment_at_a_time() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let other_handle = matcher.clone();

    let _enrollment = matcher.start_enrollment(FmdFormat::Ansi378_2004).unwrap();
    assert!(matches!(
        other_handle.start_enrollment(FmdFormat::Ansi378_2004),
        Err(DpfpError::AlreadyInProgress)
    ));
    assert_eq!(sdk.calls().start_enrollment, 1);
}

#[test]
fn native_in_progress_maps_to_already_in_progress() {
    let sdk = ScriptedSdk::new();
    let first = matcher(&sdk);
    let second = matcher(&sdk);

    let _enrollment = first.start_enrollment(FmdFormat::Ansi378_2004).unwrap();
    assert!(matches!(
        second.start_enrollment(FmdFormat::Ansi378_2004),
        Err(DpfpError::AlreadyInProgress)
    ));
    // The rejected start must not release the other matcher's enrollment.
    assert_eq!(sdk.calls().finish_enrollment, 0);
}

#[test]
fn add_without_native_enrollment_is_not_started() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let fmd = template(&matcher, 1);

    let enrollment = matcher.start_enrollment(FmdFormat::Ansi378_2004).unwrap();
    // Simulate the library losing its accumulator.
    let api: &dyn MatchApi = sdk.as_ref();
    api.finish_enrollment();

    assert!(matches!(enrollment.add(&fmd, 0), Err(DpfpError::NotStarted)));
}

#[test]
fn creating_template_too_early_is_not_ready() {
    let sdk = ScriptedSdk::new();
    let matcher = matcher(&sdk);
    let fmd = template(&matcher, 1);

    let enrollment = matcher.start_enrollment(FmdFormat::Ansi378_2004).unwrap();
    let mut ready = match enrollment.add(&fmd, 0).unwrap() {
        Step::NeedMore(enrollment) => match enrollment.add(&fmd, 0).unwrap() {
            Step::Ready(ready) => ready,
            Step::NeedMore(_) => panic!("not ready after two views"),
        },
        Step::Ready(ready) => ready,
    };
    sdk.state().views_required = 5;

    assert!(matches!(ready.create_template(), Err(DpfpError::NotReady)));
}
