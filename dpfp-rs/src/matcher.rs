use std::ffi::OsStr;
use std::mem;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use dpfp_sys::{MatchingLibrary, DPFJ_CANDIDATE, DPFJ_VERSION};
use tracing::{debug, trace};

use crate::api::MatchApi;
use crate::errors::check;
use crate::probe::fetch_sized;
use crate::{
    Candidate, Collecting, DpfpError, Enrollment, FidFormat, FingerPosition, Fmd, FmdFormat,
    LibraryVersion, Operation, RawImage, Score, Threshold,
};

#[derive(Debug)]
pub(crate) struct MatcherShared {
    pub(crate) api: Arc<dyn MatchApi>,
    /// Set while an enrollment started from this matcher is outstanding.
    pub(crate) enrolling: AtomicBool,
}

/// Template extraction, comparison and enrollment. Clones share the enrollment slot.
#[derive(Debug, Clone)]
pub struct Matcher {
    pub(crate) shared: Arc<MatcherShared>,
}

impl Matcher {
    pub fn new(api: Arc<dyn MatchApi>) -> Self {
        Matcher {
            shared: Arc::new(MatcherShared {
                api,
                enrolling: AtomicBool::new(false),
            }),
        }
    }

    /// Loads `dpfj` from the library search path.
    pub fn load() -> crate::Result<Self> {
        Ok(Matcher::new(Arc::new(MatchingLibrary::load()?)))
    }

    pub fn load_from<P: AsRef<OsStr>>(path: P) -> crate::Result<Self> {
        Ok(Matcher::new(Arc::new(MatchingLibrary::load_from(path)?)))
    }

    pub(crate) fn api(&self) -> &dyn MatchApi {
        self.shared.api.as_ref()
    }

    pub fn version(&self) -> crate::Result<LibraryVersion> {
        let mut version = DPFJ_VERSION {
            size: mem::size_of::<DPFJ_VERSION>() as u32,
            ..Default::default()
        };
        check(self.api().version(&mut version), Operation::Version)?;

        Ok(LibraryVersion {
            library: version.lib_ver.into(),
            api: version.api_ver.into(),
        })
    }

    /// Extracts a template from a bare 8 bpp raster.
    pub fn create_from_image(
        &self,
        image: &RawImage,
        finger: FingerPosition,
        cbeff_id: u32,
        format: FmdFormat,
    ) -> crate::Result<Fmd> {
        if image.width == 0
            || image.height == 0
            || image.bpp != 8
            || image.pixels.len() != image.expected_len()
        {
            return Err(DpfpError::InvalidParameter(Operation::CreateFromRaw));
        }

        let probed = fetch_sized(Operation::CreateFromRaw, |fmd, size| {
            self.api().create_fmd_from_raw(
                &image.pixels,
                image.width,
                image.height,
                image.dpi,
                finger.raw(),
                cbeff_id,
                format.raw(),
                fmd,
                size,
            )
        })?;
        debug!(bytes = probed.data.len(), %format, %finger, "template created from raster");

        Ok(Fmd::new(format, probed.data))
    }

    /// Extracts a template from an ANSI 381 or ISO 19794-4 finger image record.
    pub fn create_from_fid(
        &self,
        fid_format: FidFormat,
        record: &[u8],
        format: FmdFormat,
    ) -> crate::Result<Fmd> {
        if record.len() <= fid_format.envelope_len() {
            return Err(DpfpError::InvalidParameter(Operation::CreateFromFid));
        }

        let probed = fetch_sized(Operation::CreateFromFid, |fmd, size| {
            self.api()
                .create_fmd_from_fid(fid_format.raw(), record, format.raw(), fmd, size)
        })?;
        debug!(bytes = probed.data.len(), %format, "template created from record");

        Ok(Fmd::new(format, probed.data))
    }

    /// Converts a template to another format.
    pub fn convert(&self, fmd: &Fmd, target: FmdFormat) -> crate::Result<Fmd> {
        if fmd.format() == target {
            return Ok(fmd.clone());
        }

        let probed = fetch_sized(Operation::Convert, |converted, size| {
            self.api()
                .fmd_convert(fmd.format().raw(), fmd.as_bytes(), target.raw(), converted, size)
        })?;

        Ok(Fmd::new(target, probed.data))
    }

    /// Dissimilarity of two template views. Whether it counts as a match is up to the caller.
    pub fn compare(
        &self,
        first: &Fmd,
        first_view: u32,
        second: &Fmd,
        second_view: u32,
    ) -> crate::Result<Score> {
        let mut score = 0u32;
        check(
            self.api().compare(
                first.format().raw(),
                first.as_bytes(),
                first_view,
                second.format().raw(),
                second.as_bytes(),
                second_view,
                &mut score,
            ),
            Operation::Compare,
        )?;
        trace!(score, "templates compared");

        Ok(Score(score))
    }

    /// Searches `gallery` for templates scoring below `threshold` against `probe`.
    ///
    /// Candidates come back in the order the library found them, which is not necessarily
    /// best first; see `rank_by_score`. All gallery templates must share one format.
    pub fn identify(
        &self,
        probe: &Fmd,
        probe_view: u32,
        gallery: &[Fmd],
        threshold: Threshold,
        max_candidates: usize,
    ) -> crate::Result<Vec<Candidate>> {
        let gallery_format = match gallery.first() {
            Some(first) => first.format(),
            None => return Ok(Vec::new()),
        };
        if gallery.iter().any(|fmd| fmd.format() != gallery_format) {
            return Err(DpfpError::InvalidTemplate(
                "gallery mixes template formats".to_string(),
            ));
        }
        if max_candidates == 0 {
            return Err(DpfpError::InvalidParameter(Operation::Identify));
        }

        let views: Vec<&[u8]> = gallery.iter().map(Fmd::as_bytes).collect();
        let slot = DPFJ_CANDIDATE {
            size: mem::size_of::<DPFJ_CANDIDATE>() as u32,
            ..Default::default()
        };
        let mut candidates = vec![slot; max_candidates];
        let mut count = max_candidates as u32;
        check(
            self.api().identify(
                probe.format().raw(),
                probe.as_bytes(),
                probe_view,
                gallery_format.raw(),
                &views,
                threshold.value(),
                &mut count,
                &mut candidates,
            ),
            Operation::Identify,
        )?;
        candidates.truncate((count as usize).min(max_candidates));
        debug!(gallery = gallery.len(), hits = candidates.len(), "identify finished");

        Ok(candidates
            .into_iter()
            .map(|candidate| Candidate {
                fmd_index: candidate.fmd_idx as usize,
                view_index: candidate.view_idx,
            })
            .collect())
    }

    /// Scores every candidate against the probe and orders them best first.
    pub fn rank_by_score(
        &self,
        probe: &Fmd,
        probe_view: u32,
        gallery: &[Fmd],
        candidates: &[Candidate],
    ) -> crate::Result<Vec<(Candidate, Score)>> {
        let mut ranked = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let fmd = gallery
                .get(candidate.fmd_index)
                .ok_or(DpfpError::InvalidParameter(Operation::Identify))?;
            let score = self.compare(probe, probe_view, fmd, candidate.view_index)?;
            ranked.push((*candidate, score));
        }
        ranked.sort_by_key(|(_, score)| *score);

        Ok(ranked)
    }

    /// Starts accumulating views into an enrollment template. Only one enrollment may be
    /// outstanding per matcher.
    pub fn start_enrollment(&self, format: FmdFormat) -> crate::Result<Enrollment<'_, Collecting>> {
        Enrollment::start(self, format)
    }
}
