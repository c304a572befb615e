use std::path::Path;

use tracing::debug;

use crate::DpfpError;

/// Greyscale pixel raster without any interchange envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub bpp: u32,
}

impl RawImage {
    /// Builds a raster, checking that the pixel count matches the geometry.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        dpi: u32,
        bpp: u32,
    ) -> crate::Result<Self> {
        let image = RawImage {
            pixels,
            width,
            height,
            dpi,
            bpp,
        };
        if image.pixels.len() != image.expected_len() {
            return Err(DpfpError::InvalidImage(format!(
                "{} bytes for {}x{} at {} bpp",
                image.pixels.len(),
                width,
                height,
                bpp
            )));
        }

        Ok(image)
    }

    /// Strips the interchange envelope in front of a `width * height` raster. The envelope
    /// length is whatever precedes the pixels; `data` shorter than the raster is an error.
    pub fn from_record(
        data: &[u8],
        width: u32,
        height: u32,
        dpi: u32,
        bpp: u32,
    ) -> crate::Result<Self> {
        let raster = raster_len(width, height, bpp);
        if raster == 0 || data.len() < raster {
            return Err(DpfpError::InvalidImage(format!(
                "record of {} bytes can not hold a {}x{} raster",
                data.len(),
                width,
                height
            )));
        }

        let envelope = data.len() - raster;
        debug!(envelope, raster, "stripping interchange envelope");
        RawImage::new(data[envelope..].to_vec(), width, height, dpi, bpp)
    }

    pub fn expected_len(&self) -> usize {
        raster_len(self.width, self.height, self.bpp)
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Saves the raster as an image file, format chosen by extension (`png`, `pgm`).
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        if self.bpp != 8 {
            return Err(DpfpError::InvalidImage(format!(
                "only 8 bpp rasters can be saved, got {}",
                self.bpp
            )));
        }

        let buffer = image::GrayImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| DpfpError::InvalidImage("raster does not match geometry".to_string()))?;
        buffer.save(path)?;

        Ok(())
    }
}

fn raster_len(width: u32, height: u32, bpp: u32) -> usize {
    let bytes_per_pixel = ((bpp as usize) + 7) / 8;
    width as usize * height as usize * bytes_per_pixel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_iso_envelope() {
        let mut record = vec![0xAA; 46];
        record.extend((0..12).map(|i| i as u8));
        let image = RawImage::from_record(&record, 4, 3, 500, 8).unwrap();
        assert_eq!(image.pixels, (0..12).map(|i| i as u8).collect::<Vec<_>>());
    }

    #[test]
    fn short_record_is_rejected() {
        assert!(RawImage::from_record(&[0; 10], 4, 3, 500, 8).is_err());
        assert!(RawImage::from_record(&[0; 10], 0, 3, 500, 8).is_err());
    }

    #[test]
    fn geometry_must_match() {
        assert!(RawImage::new(vec![0; 11], 4, 3, 500, 8).is_err());
    }

    #[test]
    fn saves_png_preview() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let image = RawImage::new(vec![128; 12], 4, 3, 500, 8).unwrap();
        image.save_to_file(&path).unwrap();

        let loaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(loaded.dimensions(), (4, 3));
    }
}
