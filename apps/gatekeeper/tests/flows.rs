use std::os::raw::c_int;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use dpfp_rs::api::CompressionApi;
use dpfp_rs::testing::{CaptureOutcome, ScriptedSdk};
use dpfp_rs::{Compressor, DpfpError, Dpfp, FmdFormat, Matcher, Quality, Score};
use gatekeeper::config::{MatchPolicy, RecordFormat};
use gatekeeper::files::DataDir;
use gatekeeper::flows::{self, Event, NewUser, Station, Verification};
use gatekeeper::store::{BlobKind, Store};
use gatekeeper::worker::{self, Outcome};
use gatekeeper::{Config, Error};
use tempfile::TempDir;

struct Fixture {
    sdk: Arc<ScriptedSdk>,
    station: Station,
    dir: TempDir,
}

impl Fixture {
    fn new() -> Fixture {
        Fixture::with(|_| {})
    }

    fn with<F: FnOnce(&mut Config)>(configure: F) -> Fixture {
        let sdk = ScriptedSdk::new();
        Fixture::build(sdk.clone(), sdk, configure)
    }

    fn build<F: FnOnce(&mut Config)>(
        sdk: Arc<ScriptedSdk>,
        compression: Arc<dyn CompressionApi>,
        configure: F,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let device = Dpfp::new(sdk.clone()).unwrap().open_first().unwrap();

        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data");
        config.storage.database = dir.path().join("gatekeeper.db");
        configure(&mut config);
        let files = DataDir::new(&config.storage.data_dir).unwrap();
        let store = Store::open(&config.storage.database).unwrap();

        let station = Station::new(
            device,
            Matcher::new(sdk.clone()),
            Compressor::new(compression),
            store,
            files,
            config,
        );

        Fixture { sdk, station, dir }
    }

    /// Second connection to the station's database.
    fn store(&self) -> Store {
        Store::open(self.dir.path().join("gatekeeper.db")).unwrap()
    }

    fn data(&self) -> &Path {
        self.station.files().path()
    }

    fn enroll(&self, user_id: &str, name: &str) -> gatekeeper::Result<flows::EnrollmentReport> {
        let user = NewUser {
            user_id: user_id.to_string(),
            name: name.to_string(),
            secondary_id: Some(format!("{}@example.org", name.to_lowercase())),
        };
        self.station.enroll(&user, &mut |_| {})
    }
}

fn kinds(store: &Store, user_id: &str) -> (usize, usize) {
    let stored = store.fingerprints(user_id).unwrap();
    let wsq = stored.iter().filter(|item| item.kind == BlobKind::Wsq).count();
    let fmd = stored.iter().filter(|item| item.kind == BlobKind::Fmd).count();
    (wsq, fmd)
}

#[test]
fn enrollment_is_persisted() {
    let fixture = Fixture::new();
    let mut events = Vec::new();
    let user = NewUser {
        user_id: "001".to_string(),
        name: "Alice".to_string(),
        secondary_id: None,
    };

    let report = fixture
        .station
        .enroll(&user, &mut |event| events.push(event))
        .unwrap();

    assert_eq!(report.scans_stored, 4);
    assert_eq!(report.views, 2);
    assert!(report.template_path.ends_with("fmd_001.dat"));
    assert!(report.metadata_path.ends_with("user_001.json"));
    assert!(fixture.data().join("001_scan_1.wsq").exists());
    assert!(fixture.data().join("001_scan_4.wsq").exists());

    let store = fixture.store();
    assert_eq!(kinds(&store, "001"), (4, 1));
    assert_eq!(store.user("001").unwrap().unwrap().name, "Alice");

    let metadata = fixture.station.files().read_metadata("001").unwrap();
    assert_eq!(metadata.scans_stored, 4);
    assert!(metadata.template);

    assert_eq!(events.first(), Some(&Event::Prompt { scan: 1, total: 4 }));
    assert!(events.contains(&Event::TemplateReady { views: 2 }));

    let calls = fixture.sdk.calls();
    assert_eq!(calls.start_enrollment, 1);
    assert_eq!(calls.finish_enrollment, 1);
    // Scans after the template was ready are only compressed.
    assert_eq!(calls.add_to_enrollment, 2);
    assert_eq!(calls.start_compression, calls.finish_compression);
}

#[test]
fn duplicate_user_is_rejected() {
    let fixture = Fixture::new();
    fixture.enroll("001", "Alice").unwrap();
    let captures = fixture.sdk.calls().capture;

    assert!(matches!(
        fixture.enroll("001", "Alice again"),
        Err(Error::DuplicateUser(ref id)) if id == "001"
    ));
    assert_eq!(fixture.sdk.calls().capture, captures);
    assert_eq!(fixture.store().users().unwrap().len(), 1);
}

#[test]
fn poor_scan_is_skipped() {
    let fixture = Fixture::new();
    fixture
        .sdk
        .script_captures(vec![CaptureOutcome::Image, CaptureOutcome::Poor(Quality::NO_FINGER.0)]);
    let mut skipped = Vec::new();
    let user = NewUser {
        user_id: "002".to_string(),
        name: "Bob".to_string(),
        secondary_id: None,
    };

    let report = fixture
        .station
        .enroll(&user, &mut |event| {
            if let Event::ScanSkipped { scan, .. } = event {
                skipped.push(scan);
            }
        })
        .unwrap();

    assert_eq!(skipped, vec![2]);
    assert_eq!(report.scans_stored, 3);
    assert_eq!(kinds(&fixture.store(), "002"), (3, 1));
    assert!(!fixture.data().join("002_scan_2.wsq").exists());
}

#[test]
fn no_stored_scan_rolls_back() {
    let fixture = Fixture::new();
    fixture
        .sdk
        .script_captures(vec![CaptureOutcome::Poor(Quality::NO_FINGER.0); 4]);

    assert!(matches!(
        fixture.enroll("003", "Carol"),
        Err(Error::NoSuccessfulScans(_))
    ));

    let store = fixture.store();
    assert!(!store.user_exists("003").unwrap());
    assert!(store.fingerprints("003").unwrap().is_empty());
    assert!(!fixture.data().join("user_003.json").exists());
    assert_eq!(fixture.sdk.calls().finish_enrollment, 1);
}

#[test]
fn accumulator_never_ready_keeps_scans() {
    let fixture = Fixture::new();
    fixture.sdk.state().views_required = 10;

    assert!(matches!(
        fixture.enroll("004", "Dave"),
        Err(Error::EnrollmentIncomplete { scans_stored: 4, .. })
    ));

    assert_eq!(kinds(&fixture.store(), "004"), (4, 0));
    assert!(!fixture.data().join("fmd_004.dat").exists());
    let metadata = fixture.station.files().read_metadata("004").unwrap();
    assert!(!metadata.template);
    assert_eq!(fixture.sdk.calls().finish_enrollment, 1);
}

#[test]
fn accumulator_failure_leaves_store_untouched() {
    let fixture = Fixture::new();
    fixture.sdk.state().add_status = Some(dpfp_sys::DPFJ_E_ENROLLMENT_NOT_STARTED);

    assert!(matches!(
        fixture.enroll("005", "Eve"),
        Err(Error::Dpfp(DpfpError::NotStarted))
    ));

    let store = fixture.store();
    assert!(!store.user_exists("005").unwrap());
    assert!(store.fingerprints("005").unwrap().is_empty());
    assert!(!fixture.data().join("005_scan_1.wsq").exists());
}

#[test]
fn verify_matches_enrolled_finger() {
    let fixture = Fixture::new();
    fixture.enroll("001", "Alice").unwrap();

    let verification = fixture.station.verify("001", &mut |_| {}).unwrap();

    assert!(verification.matched);
    assert_eq!(verification.score, Some(Score(0)));
    assert_eq!(verification.user.name, "Alice");
    // The template is tried first and matches.
    assert_eq!(verification.compared, 1);
}

#[test]
fn verify_rejects_other_finger() {
    let fixture = Fixture::new();
    fixture.enroll("001", "Alice").unwrap();
    fixture.sdk.place_finger(2);

    let verification = fixture.station.verify("001", &mut |_| {}).unwrap();

    assert!(!verification.matched);
    assert!(verification.score.unwrap() > Score(100));
    assert_eq!(verification.compared, 5);
}

#[test]
fn verify_unknown_user() {
    let fixture = Fixture::new();

    assert!(matches!(
        fixture.station.verify("404", &mut |_| {}),
        Err(Error::UnknownUser(_))
    ));
}

#[test]
fn identify_finds_enrolled_user() {
    let fixture = Fixture::new();
    fixture.enroll("001", "Alice").unwrap();
    fixture.sdk.place_finger(2);
    fixture.enroll("002", "Bob").unwrap();

    let found = fixture.station.identify(&mut |_| {}).unwrap().unwrap();
    assert_eq!(found.user_id, "002");
    assert_eq!(found.score, Score(0));
    assert_eq!(found.candidates, 1);

    fixture.sdk.place_finger(3);
    assert_eq!(fixture.station.identify(&mut |_| {}).unwrap(), None);
}

#[test]
fn identify_needs_a_gallery() {
    let fixture = Fixture::new();

    assert!(matches!(
        fixture.station.identify(&mut |_| {}),
        Err(Error::EmptyGallery)
    ));
}

#[test]
fn identify_from_template_files() {
    let fixture = Fixture::new();
    fixture.enroll("001", "Alice").unwrap();
    fixture.sdk.place_finger(2);
    fixture.enroll("002", "Bob").unwrap();
    fixture.sdk.place_finger(1);

    let found = fixture
        .station
        .identify_dir(fixture.data(), &mut |_| {})
        .unwrap()
        .unwrap();

    assert_eq!(found.user_id, "001");
}

#[test]
fn compare_template_files() {
    let fixture = Fixture::new();
    let alice = fixture.enroll("001", "Alice").unwrap();
    fixture.sdk.place_finger(2);
    let bob = fixture.enroll("002", "Bob").unwrap();
    let format = FmdFormat::from(fixture.station.config().matching.format);

    let same = flows::compare_files(
        fixture.station.matcher(),
        format,
        &alice.template_path,
        &alice.template_path,
    )
    .unwrap();
    assert_eq!(same.score, Score(0));

    let other = flows::compare_files(
        fixture.station.matcher(),
        format,
        &alice.template_path,
        &bob.template_path,
    )
    .unwrap();
    assert!(other.score > Score(100));
    assert!(other.false_match_rate > same.false_match_rate);
}

#[test]
fn capture_writes_dumps() {
    let fixture = Fixture::new();

    let report = fixture.station.capture("probe").unwrap();

    assert_eq!((report.width, report.height, report.dpi), (400, 500, 500));
    assert_eq!(report.bytes, 46 + 400 * 500);
    assert!(report.raw_path.exists());
    assert!(report.png_path.exists());
}

#[test]
fn stream_waits_for_finger() {
    let fixture = Fixture::new();
    fixture.sdk.state().finger_after_polls = 2;
    let mut events = Vec::new();

    let report = fixture
        .station
        .stream("live", &mut |event| events.push(event))
        .unwrap();

    assert_eq!(events.first(), Some(&Event::FingerDetected(true)));
    assert!(report.png_path.exists());
    let calls = fixture.sdk.calls();
    assert_eq!(calls.start_stream, 1);
    assert_eq!(calls.stop_stream, 1);
}

#[test]
fn worker_reports_events_and_outcome() {
    let fixture = Fixture::new();
    let Fixture { sdk, station, dir } = fixture;
    let station = Arc::new(station);
    let user = NewUser {
        user_id: "006".to_string(),
        name: "Frank".to_string(),
        secondary_id: None,
    };

    let job = worker::spawn(station.clone(), move |station, on_event| {
        Ok(Outcome::Enrolled(station.enroll(&user, on_event)?))
    });
    let mut prompts = 0;
    let outcome = job
        .wait(|event| {
            if let Event::Prompt { .. } = event {
                prompts += 1;
            }
        })
        .unwrap();

    match outcome {
        Outcome::Enrolled(report) => assert_eq!(report.user_id, "006"),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(prompts, 4);
    assert_eq!(sdk.calls().finish_enrollment, 1);
    drop(dir);
}

#[test]
fn worker_returns_errors() {
    let Fixture { station, .. } = Fixture::new();

    let job = worker::spawn(Arc::new(station), |station, on_event| {
        Ok(Outcome::Identified(station.identify(on_event)?))
    });

    assert!(matches!(job.wait(|_| {}), Err(Error::EmptyGallery)));
}

#[test]
fn ansi_records_pass_the_size_gate() {
    let fixture = Fixture::with(|config| config.capture.image_format = RecordFormat::Ansi);

    let report = fixture.enroll("007", "Grace").unwrap();

    assert_eq!(report.scans_stored, 4);
    assert_eq!(kinds(&fixture.store(), "007"), (4, 1));
}

/// Enrolls user 001 with a different finger on every scan (scan n uses finger n), then
/// verifies finger 3 with every score below the threshold.
fn verify_mixed_scans(policy: MatchPolicy) -> Verification {
    let fixture = Fixture::with(|config| {
        config.matching.policy = policy;
        config.matching.threshold = Score::MAX.0;
    });
    let sdk = fixture.sdk.clone();
    let user = NewUser {
        user_id: "001".to_string(),
        name: "Alice".to_string(),
        secondary_id: None,
    };
    fixture
        .station
        .enroll(&user, &mut |event| {
            if let Event::Prompt { scan, .. } = event {
                sdk.place_finger(scan as u8);
            }
        })
        .unwrap();

    fixture.sdk.place_finger(3);
    fixture.station.verify("001", &mut |_| {}).unwrap()
}

#[test]
fn best_match_keeps_the_lowest_score() {
    let verification = verify_mixed_scans(MatchPolicy::BestMatch);

    assert!(verification.matched);
    assert_eq!(verification.score, Some(Score(0)));
    assert_eq!(verification.compared, 5);
}

#[test]
fn first_match_stops_at_the_first_hit() {
    let verification = verify_mixed_scans(MatchPolicy::FirstMatch);

    assert!(verification.matched);
    assert!(verification.score.unwrap() > Score(0));
    assert_eq!(verification.compared, 1);
}

/// Compression library that blocks inside the first expansion after being armed, until the
/// test releases it.
#[derive(Debug)]
struct BlockingExpansion {
    sdk: Arc<ScriptedSdk>,
    armed: AtomicBool,
    entered: Barrier,
    release: Barrier,
}

impl BlockingExpansion {
    fn new(sdk: Arc<ScriptedSdk>) -> Self {
        BlockingExpansion {
            sdk,
            armed: AtomicBool::new(false),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }
}

impl CompressionApi for BlockingExpansion {
    fn start_compression(&self) -> c_int {
        self.sdk.start_compression()
    }

    fn finish_compression(&self) -> c_int {
        self.sdk.finish_compression()
    }

    fn set_wsq_bitrate(&self, bitrate_x100: u32, tolerance_aw: u32) -> c_int {
        self.sdk.set_wsq_bitrate(bitrate_x100, tolerance_aw)
    }

    fn set_wsq_size(&self, size: u32, tolerance_aw: u32) -> c_int {
        self.sdk.set_wsq_size(size, tolerance_aw)
    }

    fn compress_raw(
        &self,
        image: &[u8],
        width: u32,
        height: u32,
        dpi: u32,
        bpp: u32,
        algorithm: c_int,
    ) -> c_int {
        self.sdk
            .compress_raw(image, width, height, dpi, bpp, algorithm)
    }

    fn compress_fid(&self, fid_type: c_int, fid: &[u8], algorithm: c_int) -> c_int {
        self.sdk.compress_fid(fid_type, fid, algorithm)
    }

    fn expand_raw(
        &self,
        data: &[u8],
        algorithm: c_int,
        width: &mut u32,
        height: &mut u32,
        dpi: &mut u32,
        bpp: &mut u32,
    ) -> c_int {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
        self.sdk
            .expand_raw(data, algorithm, width, height, dpi, bpp)
    }

    fn expand_fid(&self, fid_type: c_int, data: &[u8], algorithm: c_int) -> c_int {
        self.sdk.expand_fid(fid_type, data, algorithm)
    }

    fn processed_data(&self, data: Option<&mut [u8]>, size: &mut u32) -> c_int {
        self.sdk.processed_data(data, size)
    }
}

#[test]
fn reader_stays_claimed_while_verify_expands_scans() {
    let sdk = ScriptedSdk::new();
    let blocking = Arc::new(BlockingExpansion::new(sdk.clone()));
    let fixture = Fixture::build(sdk.clone(), blocking.clone(), |_| {});
    fixture.enroll("001", "Alice").unwrap();
    // A different finger misses the template, so verify goes on to the compressed scans.
    sdk.place_finger(2);
    blocking.armed.store(true, Ordering::SeqCst);

    let Fixture { station, dir, .. } = fixture;
    let station = Arc::new(station);
    let verifying = {
        let station = station.clone();
        thread::spawn(move || station.verify("001", &mut |_| {}))
    };
    blocking.entered.wait();

    let user = NewUser {
        user_id: "002".to_string(),
        name: "Bob".to_string(),
        secondary_id: None,
    };
    let concurrent = station.enroll(&user, &mut |_| {});
    blocking.release.wait();

    assert!(matches!(concurrent, Err(Error::Busy)));
    let verification = verifying.join().unwrap().unwrap();
    assert!(!verification.matched);
    assert_eq!(verification.compared, 5);

    let store = Store::open(dir.path().join("gatekeeper.db")).unwrap();
    assert!(!store.user_exists("002").unwrap());
    assert_eq!(sdk.calls().start_compression, sdk.calls().finish_compression);
}
