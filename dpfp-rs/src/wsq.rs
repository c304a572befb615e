use std::ffi::OsStr;
use std::sync::Arc;

use dpfp_sys::CompressionLibrary;
use tracing::{debug, warn};

use crate::api::CompressionApi;
use crate::errors::check;
use crate::probe::fetch_sized;
use crate::{CompressionAlgorithm, DpfpError, FidFormat, Operation, RawImage};

/// Rate control for WSQ compression.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WsqTarget {
    /// Target bitrate in hundredths of a bit per pixel.
    Bitrate { bitrate_x100: u32, tolerance_aw: u32 },
    /// Target compressed size in bytes.
    Size { size: u32, tolerance_aw: u32 },
}

impl Default for WsqTarget {
    fn default() -> Self {
        WsqTarget::Bitrate {
            bitrate_x100: 75,
            tolerance_aw: 10,
        }
    }
}

/// WSQ compression through the vendor compression library.
#[derive(Debug, Clone)]
pub struct Compressor {
    api: Arc<dyn CompressionApi>,
    algorithm: CompressionAlgorithm,
}

impl Compressor {
    pub fn new(api: Arc<dyn CompressionApi>) -> Self {
        Compressor {
            api,
            algorithm: CompressionAlgorithm::default(),
        }
    }

    /// Loads `dpfj_compression` from the library search path.
    pub fn load() -> crate::Result<Self> {
        Ok(Compressor::new(Arc::new(CompressionLibrary::load()?)))
    }

    pub fn load_from<P: AsRef<OsStr>>(path: P) -> crate::Result<Self> {
        Ok(Compressor::new(Arc::new(CompressionLibrary::load_from(path)?)))
    }

    pub fn with_algorithm(mut self, algorithm: CompressionAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    fn session(&self) -> crate::Result<CompressionSession<'_>> {
        check(self.api.start_compression(), Operation::StartCompression)?;

        Ok(CompressionSession {
            api: self.api.as_ref(),
            finished: false,
        })
    }

    /// Compresses a bare raster to WSQ.
    pub fn compress_raw(&self, image: &RawImage, target: WsqTarget) -> crate::Result<Vec<u8>> {
        validate_for_wsq(image)?;

        let session = self.session()?;
        session.configure(target)?;
        check(
            self.api.compress_raw(
                &image.pixels,
                image.width,
                image.height,
                image.dpi,
                image.bpp,
                self.algorithm.raw(),
            ),
            Operation::Compress,
        )?;
        let wsq = session.processed_data()?;
        session.finish()?;
        debug!(
            raw = image.pixels.len(),
            compressed = wsq.len(),
            "raster compressed"
        );

        Ok(wsq)
    }

    /// Compresses the raster inside a finger image record, keeping the record around it.
    pub fn compress_fid(
        &self,
        fid_format: FidFormat,
        record: &[u8],
        target: WsqTarget,
    ) -> crate::Result<Vec<u8>> {
        if record.len() <= fid_format.envelope_len() {
            return Err(DpfpError::InvalidImage(format!(
                "record of {} bytes holds no image",
                record.len()
            )));
        }

        let session = self.session()?;
        session.configure(target)?;
        check(
            self.api
                .compress_fid(fid_format.raw(), record, self.algorithm.raw()),
            Operation::Compress,
        )?;
        let compressed = session.processed_data()?;
        session.finish()?;

        Ok(compressed)
    }

    /// Decompresses WSQ data back into a raster.
    pub fn expand_raw(&self, data: &[u8]) -> crate::Result<RawImage> {
        if data.is_empty() {
            return Err(DpfpError::InvalidImage("no WSQ data".to_string()));
        }

        let session = self.session()?;
        let (mut width, mut height, mut dpi, mut bpp) = (0u32, 0u32, 0u32, 0u32);
        check(
            self.api.expand_raw(
                data,
                self.algorithm.raw(),
                &mut width,
                &mut height,
                &mut dpi,
                &mut bpp,
            ),
            Operation::Expand,
        )?;
        let pixels = session.processed_data()?;
        session.finish()?;

        RawImage::new(pixels, width, height, dpi, bpp)
    }

    /// Decompresses the image inside a WSQ-compressed finger image record.
    pub fn expand_fid(&self, fid_format: FidFormat, data: &[u8]) -> crate::Result<Vec<u8>> {
        if data.is_empty() {
            return Err(DpfpError::InvalidImage("no WSQ data".to_string()));
        }

        let session = self.session()?;
        check(
            self.api.expand_fid(fid_format.raw(), data, self.algorithm.raw()),
            Operation::Expand,
        )?;
        let record = session.processed_data()?;
        session.finish()?;

        Ok(record)
    }
}

/// Rejects rasters the WSQ encoder can not take.
pub fn validate_for_wsq(image: &RawImage) -> crate::Result<()> {
    if image.pixels.is_empty() {
        return Err(DpfpError::InvalidImage("image data is empty".to_string()));
    }
    if image.width == 0 || image.height == 0 {
        return Err(DpfpError::InvalidImage(format!(
            "invalid dimensions {}x{}",
            image.width, image.height
        )));
    }
    if !(300..=1000).contains(&image.dpi) {
        return Err(DpfpError::InvalidImage(format!(
            "DPI {} outside 300..=1000",
            image.dpi
        )));
    }
    if image.bpp != 8 {
        return Err(DpfpError::InvalidImage(format!(
            "{} bpp, WSQ needs 8",
            image.bpp
        )));
    }
    if image.pixels.len() != image.expected_len() {
        return Err(DpfpError::InvalidImage(format!(
            "{} bytes for {}x{}",
            image.pixels.len(),
            image.width,
            image.height
        )));
    }

    Ok(())
}

/// Started compression context; finished exactly once.
struct CompressionSession<'c> {
    api: &'c dyn CompressionApi,
    finished: bool,
}

impl<'c> CompressionSession<'c> {
    fn configure(&self, target: WsqTarget) -> crate::Result<()> {
        let status = match target {
            WsqTarget::Bitrate {
                bitrate_x100,
                tolerance_aw,
            } => self.api.set_wsq_bitrate(bitrate_x100, tolerance_aw),
            WsqTarget::Size { size, tolerance_aw } => self.api.set_wsq_size(size, tolerance_aw),
        };

        check(status, Operation::ConfigureCompression)
    }

    fn processed_data(&self) -> crate::Result<Vec<u8>> {
        let api = self.api;
        let probed = fetch_sized(Operation::ProcessedData, |data, size| {
            api.processed_data(data, size)
        })?;

        Ok(probed.data)
    }

    fn finish(mut self) -> crate::Result<()> {
        self.finished = true;
        check(self.api.finish_compression(), Operation::FinishCompression)
    }
}

impl<'c> Drop for CompressionSession<'c> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(error) = check(self.api.finish_compression(), Operation::FinishCompression) {
                warn!(%error, "finishing compression failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(dpi: u32, bpp: u32) -> RawImage {
        RawImage {
            pixels: vec![0x80; 16],
            width: 4,
            height: 4,
            dpi,
            bpp,
        }
    }

    #[test]
    fn accepts_plain_8bpp_raster() {
        assert!(validate_for_wsq(&raster(500, 8)).is_ok());
        assert!(validate_for_wsq(&raster(300, 8)).is_ok());
        assert!(validate_for_wsq(&raster(1000, 8)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_dpi() {
        assert!(validate_for_wsq(&raster(299, 8)).is_err());
        assert!(validate_for_wsq(&raster(1001, 8)).is_err());
    }

    #[test]
    fn rejects_other_bit_depths() {
        assert!(validate_for_wsq(&raster(500, 16)).is_err());
    }

    #[test]
    fn rejects_empty_and_mismatched_data() {
        let mut image = raster(500, 8);
        image.pixels.clear();
        assert!(validate_for_wsq(&image).is_err());

        let mut image = raster(500, 8);
        image.pixels.push(0);
        assert!(validate_for_wsq(&image).is_err());
    }
}
