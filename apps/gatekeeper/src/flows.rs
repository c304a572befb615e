//! Enrollment, verification and identification flows of one reader station.
//!
//! A `Station` owns one opened reader, the matching and compression libraries, the
//! database and the data directory. Every operation that touches the reader, the
//! enrollment accumulator or the compression context claims the reader first and keeps the
//! claim until its last native call; a second operation started while one is outstanding
//! fails with `Error::Busy`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use chrono::Local;
use dpfp_rs::{
    Capabilities, Compressor, Device, DeviceStatus, Dpfp, DpfpError, Fmd, FmdFormat,
    LibraryVersion, Matcher, Quality, RawImage, Score, ScoreBand, Step,
};
use tracing::{debug, info, warn};

use crate::config::{Config, MatchPolicy};
use crate::error::{io_error, Error, Result};
use crate::files::{self, DataDir, UserMetadata};
use crate::quality::QualityGate;
use crate::store::{BlobKind, Store, User};

/// Progress reported while an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Waiting for the finger for scan `scan` of `total`.
    Prompt { scan: usize, total: usize },
    ScanStored { scan: usize, wsq_bytes: usize },
    ScanSkipped { scan: usize, reason: String },
    /// The accumulator has enough views for a template.
    TemplateReady { views: usize },
    FingerDetected(bool),
    Frame { bytes: usize, quality: Quality },
}

/// User to enroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub user_id: String,
    pub name: String,
    pub secondary_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentReport {
    pub user_id: String,
    pub scans_stored: usize,
    pub views: usize,
    pub template_path: PathBuf,
    pub metadata_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub user: User,
    /// Lowest score seen, `None` when nothing could be compared.
    pub score: Option<Score>,
    pub matched: bool,
    pub compared: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub user_id: String,
    pub score: Score,
    /// Candidates the library reported below the threshold.
    pub candidates: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub score: Score,
    pub band: ScoreBand,
    pub false_match_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub bytes: usize,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub raw_path: PathBuf,
    pub png_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationStatus {
    pub reader: String,
    pub status: DeviceStatus,
    pub capabilities: Capabilities,
}

/// Everything one capture produced for an enrollment.
struct Scan {
    wsq: Vec<u8>,
    fmd: Option<Fmd>,
}

#[derive(Debug)]
pub struct Station {
    device: Mutex<Device>,
    store: Mutex<Store>,
    matcher: Matcher,
    compressor: Compressor,
    files: DataDir,
    gate: QualityGate,
    config: Config,
}

impl Station {
    pub fn new(
        device: Device,
        matcher: Matcher,
        compressor: Compressor,
        store: Store,
        files: DataDir,
        config: Config,
    ) -> Station {
        let gate = QualityGate::for_format(
            config.enrollment.min_image_bytes,
            config.enrollment.max_image_bytes,
            config.capture.image_format.into(),
        );
        let compressor = compressor.with_algorithm(config.compression.algorithm.into());

        Station {
            device: Mutex::new(device),
            store: Mutex::new(store),
            matcher,
            compressor,
            files,
            gate,
            config,
        }
    }

    /// Loads the vendor libraries, opens the configured reader and the database.
    pub fn open(config: Config) -> Result<Station> {
        let dpfp = match &config.sdk.device_library {
            Some(path) => Dpfp::load_from(path)?,
            None => Dpfp::load()?,
        };
        let matcher = match &config.sdk.matching_library {
            Some(path) => Matcher::load_from(path)?,
            None => Matcher::load()?,
        };
        let compressor = match &config.sdk.compression_library {
            Some(path) => Compressor::load_from(path)?,
            None => Compressor::load()?,
        };

        let device = match (&config.sdk.reader, config.sdk.priority) {
            (Some(name), Some(priority)) => dpfp.open_with_priority(name, priority.into())?,
            (Some(name), None) => dpfp.open(name)?,
            (None, _) => dpfp.open_first()?,
        };

        let files = DataDir::new(&config.storage.data_dir)?;
        let store = Store::open(&config.storage.database)?;
        info!(
            reader = device.name(),
            data_dir = %files.path().display(),
            "station ready"
        );

        Ok(Station::new(device, matcher, compressor, store, files, config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn files(&self) -> &DataDir {
        &self.files
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    fn claim(&self) -> Result<MutexGuard<'_, Device>> {
        match self.device.try_lock() {
            Ok(device) => Ok(device),
            Err(TryLockError::WouldBlock) => Err(Error::Busy),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        match self.store.lock() {
            Ok(store) => store,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn format(&self) -> FmdFormat {
        self.config.matching.format.into()
    }

    pub fn status(&self) -> Result<StationStatus> {
        let device = self.claim()?;

        Ok(StationStatus {
            reader: device.name().to_string(),
            status: device.status()?,
            capabilities: device.capabilities()?,
        })
    }

    pub fn matcher_version(&self) -> Result<LibraryVersion> {
        Ok(self.matcher.version()?)
    }

    /// Captures one image, runs it through the quality gate and strips the envelope.
    fn acquire(&self, device: &Device, stem: &str) -> Result<RawImage> {
        let capture = device.capture(
            &self.config.capture.params(),
            self.config.capture.timeout_ms,
        )?;
        self.gate.check(&capture).map_err(Error::Rejected)?;
        let raster = capture.raster()?;

        if self.config.storage.dump_raw {
            self.files.dump_raw(stem, &capture.data)?;
        }
        if self.config.storage.dump_png {
            self.files.dump_png(stem, &raster)?;
        }

        Ok(raster)
    }

    fn template_of(&self, raster: &RawImage) -> Result<Fmd> {
        let fmd = self.matcher.create_from_image(
            raster,
            self.config.enrollment.finger_position(),
            0,
            self.format(),
        )?;
        fmd.validate()?;

        Ok(fmd)
    }

    fn enroll_scan(
        &self,
        device: &Device,
        user_id: &str,
        scan: usize,
        needs_template: bool,
    ) -> Result<Scan> {
        let raster = self.acquire(device, &format!("{}_scan_{}", user_id, scan))?;
        let wsq = self
            .compressor
            .compress_raw(&raster, self.config.compression.target())?;
        let fmd = if needs_template {
            Some(self.template_of(&raster)?)
        } else {
            None
        };

        Ok(Scan { wsq, fmd })
    }

    /// Enrolls a new user from `enrollment.scans` captures.
    ///
    /// Scans that fail to capture, pass the quality gate, compress or extract are skipped.
    /// Each stored scan is kept as WSQ; templates are added to the accumulator until it is
    /// ready. The user row and all blobs are committed together once at least one scan was
    /// stored. An accumulator that never became ready is reported as
    /// `EnrollmentIncomplete` after the scans were committed.
    pub fn enroll(
        &self,
        user: &NewUser,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<EnrollmentReport> {
        DataDir::validate_user_id(&user.user_id)?;
        let device = self.claim()?;
        let mut store = self.store();
        if store.user_exists(&user.user_id)? {
            return Err(Error::DuplicateUser(user.user_id.clone()));
        }

        let record = User {
            user_id: user.user_id.clone(),
            name: user.name.clone(),
            secondary_id: user.secondary_id.clone(),
        };
        let mut tx = store.begin_enrollment(&record)?;
        let mut step = Step::NeedMore(self.matcher.start_enrollment(self.format())?);
        let total = self.config.enrollment.scans;
        let mut compressed = Vec::new();
        info!(user_id = %user.user_id, scans = total, "enrollment started");

        for scan in 1..=total {
            on_event(Event::Prompt { scan, total });
            let needs_template = matches!(step, Step::NeedMore(_));
            let scanned = self.enroll_scan(&device, &user.user_id, scan, needs_template);
            let Scan { wsq, fmd } = match scanned {
                Ok(scan) => scan,
                Err(error) => {
                    warn!(scan, %error, "scan skipped");
                    on_event(Event::ScanSkipped {
                        scan,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            tx.store(BlobKind::Wsq, &wsq)?;
            on_event(Event::ScanStored {
                scan,
                wsq_bytes: wsq.len(),
            });
            compressed.push((scan, wsq));

            step = match (step, fmd) {
                (Step::NeedMore(enrollment), Some(fmd)) => {
                    let next = enrollment.add(&fmd, 0)?;
                    if let Step::Ready(ready) = &next {
                        on_event(Event::TemplateReady {
                            views: ready.views(),
                        });
                    }
                    next
                }
                (step, _) => step,
            };
        }

        let (template, views) = match step {
            Step::Ready(mut ready) => {
                let views = ready.views();
                let created = ready.create_template();
                if let Err(error) = ready.finish() {
                    warn!(%error, "finishing enrollment failed");
                }
                match created {
                    Ok(template) => (Some(template), views),
                    Err(DpfpError::NotReady) => (None, views),
                    Err(error) => return Err(error.into()),
                }
            }
            Step::NeedMore(enrollment) => {
                let views = enrollment.views();
                if let Err(error) = enrollment.finish() {
                    warn!(%error, "finishing enrollment failed");
                }
                (None, views)
            }
        };

        let scans_stored = compressed.len();
        if scans_stored == 0 {
            tx.rollback()?;
            warn!(user_id = %user.user_id, "no scan stored, enrollment rolled back");
            return Err(Error::NoSuccessfulScans(user.user_id.clone()));
        }
        if let Some(template) = &template {
            tx.store(BlobKind::Fmd, template.as_bytes())?;
        }
        tx.commit()?;
        drop(store);
        drop(device);

        if self.config.storage.write_wsq_files {
            for (scan, wsq) in &compressed {
                self.files
                    .write_wsq(&format!("{}_scan_{}", user.user_id, scan), wsq)?;
            }
        }
        let template_path = match &template {
            Some(template) => Some(self.files.write_template(&user.user_id, template)?),
            None => None,
        };
        let metadata_path = self.files.write_metadata(&UserMetadata {
            user_id: user.user_id.clone(),
            name: user.name.clone(),
            secondary_id: user.secondary_id.clone(),
            enrolled_at: Local::now().to_rfc3339(),
            scans_stored,
            template: template.is_some(),
        })?;

        match template_path {
            Some(template_path) => {
                info!(user_id = %user.user_id, scans_stored, views, "user enrolled");
                Ok(EnrollmentReport {
                    user_id: user.user_id.clone(),
                    scans_stored,
                    views,
                    template_path,
                    metadata_path,
                })
            }
            None => {
                warn!(user_id = %user.user_id, scans_stored, views, "no enrollment template");
                Err(Error::EnrollmentIncomplete {
                    user_id: user.user_id.clone(),
                    scans_stored,
                })
            }
        }
    }

    /// Checks a fresh capture against everything stored for `user_id`.
    pub fn verify(&self, user_id: &str, on_event: &mut dyn FnMut(Event)) -> Result<Verification> {
        let device = self.claim()?;
        let (user, mut stored) = {
            let store = self.store();
            let user = store
                .user(user_id)?
                .ok_or_else(|| Error::UnknownUser(user_id.to_string()))?;
            (user, store.fingerprints(user_id)?)
        };
        if stored.is_empty() {
            return Err(Error::EmptyGallery);
        }
        // Templates compare directly; scans need an expand and an extraction first.
        stored.sort_by_key(|item| item.kind != BlobKind::Fmd);

        on_event(Event::Prompt { scan: 1, total: 1 });
        let probe = self.template_of(&self.acquire(&device, &format!("verify_{}", user_id))?)?;

        let threshold = self.config.matching.threshold();
        let mut best: Option<Score> = None;
        let mut compared = 0;
        for item in &stored {
            let reference = match self.reference_template(item.kind, &item.blob) {
                Ok(reference) => reference,
                Err(error) => {
                    warn!(id = item.id, kind = %item.kind, %error, "stored item skipped");
                    continue;
                }
            };
            let score = self.matcher.compare(&probe, 0, &reference, 0)?;
            compared += 1;
            debug!(id = item.id, kind = %item.kind, %score, "compared");
            if best.map_or(true, |best| score < best) {
                best = Some(score);
            }
            if self.config.matching.policy == MatchPolicy::FirstMatch && score.is_below(threshold) {
                break;
            }
        }
        // Expanding stored scans uses the compression context, so the claim lasts until here.
        drop(device);

        let matched = best.map_or(false, |score| score.is_below(threshold));
        info!(user_id, matched, compared, "verification finished");

        Ok(Verification {
            user,
            score: best,
            matched,
            compared,
        })
    }

    fn reference_template(&self, kind: BlobKind, blob: &[u8]) -> Result<Fmd> {
        match kind {
            BlobKind::Fmd => Ok(Fmd::from_bytes(self.format(), blob.to_vec())?),
            BlobKind::Wsq => {
                let raster = self.compressor.expand_raw(blob)?;
                self.template_of(&raster)
            }
        }
    }

    /// Identifies a fresh capture against every enrolled template in the database.
    pub fn identify(&self, on_event: &mut dyn FnMut(Event)) -> Result<Option<Identification>> {
        let device = self.claim()?;
        let templates = self.store().templates()?;
        if templates.is_empty() {
            return Err(Error::EmptyGallery);
        }

        let mut labels = Vec::with_capacity(templates.len());
        let mut gallery = Vec::with_capacity(templates.len());
        for item in templates {
            match Fmd::from_bytes(self.format(), item.blob) {
                Ok(fmd) => {
                    labels.push(item.user_id);
                    gallery.push(fmd);
                }
                Err(error) => warn!(id = item.id, %error, "stored template skipped"),
            }
        }

        on_event(Event::Prompt { scan: 1, total: 1 });
        let probe = self.template_of(&self.acquire(&device, "identify")?)?;
        let best = self.best_candidate(&probe, &labels, &gallery);
        drop(device);

        best
    }

    /// Identifies a fresh capture against the `fmd_<id>.dat` files in `dir`.
    pub fn identify_dir(
        &self,
        dir: &Path,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<Option<Identification>> {
        let device = self.claim()?;
        let templates = files::read_templates(dir, self.format())?;
        if templates.is_empty() {
            return Err(Error::EmptyGallery);
        }
        let (labels, gallery): (Vec<String>, Vec<Fmd>) = templates
            .into_iter()
            .map(|template| (template.user_id, template.fmd))
            .unzip();

        on_event(Event::Prompt { scan: 1, total: 1 });
        let probe = self.template_of(&self.acquire(&device, "identify")?)?;
        let best = self.best_candidate(&probe, &labels, &gallery);
        drop(device);

        best
    }

    fn best_candidate(
        &self,
        probe: &Fmd,
        labels: &[String],
        gallery: &[Fmd],
    ) -> Result<Option<Identification>> {
        let candidates = self.matcher.identify(
            probe,
            0,
            gallery,
            self.config.matching.threshold(),
            self.config.matching.max_candidates,
        )?;
        let ranked = self
            .matcher
            .rank_by_score(probe, 0, gallery, &candidates)?;

        let best = ranked.first().and_then(|(candidate, score)| {
            labels.get(candidate.fmd_index).map(|user_id| Identification {
                user_id: user_id.clone(),
                score: *score,
                candidates: ranked.len(),
            })
        });
        match &best {
            Some(found) => info!(user_id = %found.user_id, score = %found.score, "identified"),
            None => info!(gallery = gallery.len(), "no match"),
        }

        Ok(best)
    }

    /// Captures one image and writes the record and a PNG preview into the data directory.
    pub fn capture(&self, stem: &str) -> Result<CaptureReport> {
        let device = self.claim()?;
        let capture = device.capture(
            &self.config.capture.params(),
            self.config.capture.timeout_ms,
        )?;
        drop(device);

        self.write_capture(stem, &capture.data, &capture.raster()?)
    }

    fn write_capture(&self, stem: &str, data: &[u8], raster: &RawImage) -> Result<CaptureReport> {
        Ok(CaptureReport {
            bytes: data.len(),
            width: raster.width,
            height: raster.height,
            dpi: raster.dpi,
            raw_path: self.files.dump_raw(stem, data)?,
            png_path: self.files.dump_png(stem, raster)?,
        })
    }

    /// Streams until a finger is detected, previews one frame, then takes a still capture.
    pub fn stream(&self, stem: &str, on_event: &mut dyn FnMut(Event)) -> Result<CaptureReport> {
        let device = self.claim()?;
        let params = self.config.capture.params();
        {
            let stream = device.start_stream()?;
            let detected = device.wait_for_finger(
                Duration::from_millis(self.config.capture.poll_ms),
                Duration::from_millis(self.config.capture.finger_timeout_ms),
            )?;
            on_event(Event::FingerDetected(detected));
            if !detected {
                return Err(Error::NoFinger);
            }

            let frame = stream.frame(&params)?;
            on_event(Event::Frame {
                bytes: frame.data.len(),
                quality: frame.result.quality,
            });
            stream.stop()?;
        }

        let capture = device.capture(&params, self.config.capture.timeout_ms)?;
        drop(device);

        self.write_capture(stem, &capture.data, &capture.raster()?)
    }
}

/// Compares two template files, as a diagnostic.
pub fn compare_files(
    matcher: &Matcher,
    format: FmdFormat,
    first: &Path,
    second: &Path,
) -> Result<Comparison> {
    let first = read_template(format, first)?;
    let second = read_template(format, second)?;
    let score = matcher.compare(&first, 0, &second, 0)?;

    Ok(Comparison {
        score,
        band: score.band(),
        false_match_rate: score.false_match_rate(),
    })
}

fn read_template(format: FmdFormat, path: &Path) -> Result<Fmd> {
    let bytes = std::fs::read(path).map_err(io_error(path))?;

    Ok(Fmd::from_bytes(format, bytes)?)
}

/// Compresses an 8 bpp raster file to WSQ.
pub fn compress_file(
    compressor: &Compressor,
    config: &Config,
    input: &Path,
    width: u32,
    height: u32,
    dpi: u32,
    output: &Path,
) -> Result<usize> {
    let pixels = std::fs::read(input).map_err(io_error(input))?;
    let image = RawImage::new(pixels, width, height, dpi, 8)?;
    let wsq = compressor.compress_raw(&image, config.compression.target())?;
    std::fs::write(output, &wsq).map_err(io_error(output))?;

    Ok(wsq.len())
}

/// Expands a WSQ file to a raster file and a PNG preview next to it.
pub fn expand_file(compressor: &Compressor, input: &Path, output: &Path) -> Result<RawImage> {
    let wsq = std::fs::read(input).map_err(io_error(input))?;
    let image = compressor.expand_raw(&wsq)?;
    std::fs::write(output, &image.pixels).map_err(io_error(output))?;
    image.save_to_file(output.with_extension("png"))?;

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpfp_rs::testing::ScriptedSdk;
    use std::sync::Arc;

    fn station(dir: &Path) -> (Arc<ScriptedSdk>, Station) {
        let sdk = ScriptedSdk::new();
        let dpfp = Dpfp::new(sdk.clone()).unwrap();
        let device = dpfp.open_first().unwrap();
        let files = DataDir::new(dir).unwrap();
        let station = Station::new(
            device,
            Matcher::new(sdk.clone()),
            Compressor::new(sdk.clone()),
            Store::open_in_memory().unwrap(),
            files,
            Config::default(),
        );
        (sdk, station)
    }

    #[test]
    fn second_operation_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let (sdk, station) = station(dir.path());
        let _held = station.claim().unwrap();

        let user = NewUser {
            user_id: "001".to_string(),
            name: "Alice".to_string(),
            secondary_id: None,
        };
        assert!(matches!(station.enroll(&user, &mut |_| {}), Err(Error::Busy)));
        assert!(matches!(station.identify(&mut |_| {}), Err(Error::Busy)));
        assert!(matches!(station.capture("busy"), Err(Error::Busy)));
        assert_eq!(sdk.calls().start_enrollment, 0);
        assert_eq!(sdk.calls().capture, 0);
    }

    #[test]
    fn invalid_user_id_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (sdk, station) = station(dir.path());
        let user = NewUser {
            user_id: "../escape".to_string(),
            name: "Mallory".to_string(),
            secondary_id: None,
        };

        assert!(matches!(
            station.enroll(&user, &mut |_| {}),
            Err(Error::InvalidUserId(_))
        ));
        assert_eq!(sdk.calls().capture, 0);
    }
}
