use std::fmt;

use dpfp_rs::{Capture, ImageFormat, Quality};

/// Size heuristic applied to every capture before it is processed.
///
/// A record far below the nominal size is a partial scan; one above it carries more than
/// one raster. The reader's own quality flags must be clean as well.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QualityGate {
    pub min_bytes: usize,
    pub max_bytes: usize,
}

impl Default for QualityGate {
    fn default() -> Self {
        QualityGate {
            min_bytes: 10_000,
            max_bytes: 200_046,
        }
    }
}

/// Why a capture was not accepted.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Rejection {
    TooSmall { len: usize, min: usize },
    TooLarge { len: usize, max: usize },
    /// The record is shorter than the raster the reader reported.
    Truncated,
    Flagged(Quality),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Rejection::TooSmall { len, min } => {
                write!(f, "{} bytes, expected at least {}", len, min)
            }
            Rejection::TooLarge { len, max } => {
                write!(f, "{} bytes, expected at most {}", len, max)
            }
            Rejection::Truncated => write!(f, "record shorter than its raster"),
            Rejection::Flagged(quality) => write!(f, "reader reported {}", quality),
        }
    }
}

impl QualityGate {
    /// Bounds for records of `format`, given bounds for an ISO 19794-4 record.
    pub fn for_format(min_bytes: usize, max_bytes: usize, format: ImageFormat) -> QualityGate {
        let shift = |bound: usize| {
            (bound + format.envelope_len()).saturating_sub(ImageFormat::Iso19794.envelope_len())
        };

        QualityGate {
            min_bytes: shift(min_bytes),
            max_bytes: shift(max_bytes),
        }
    }

    pub fn check(&self, capture: &Capture) -> Result<(), Rejection> {
        let len = capture.data.len();
        if len < self.min_bytes {
            return Err(Rejection::TooSmall {
                len,
                min: self.min_bytes,
            });
        }
        if len > self.max_bytes {
            return Err(Rejection::TooLarge {
                len,
                max: self.max_bytes,
            });
        }
        if capture.envelope_len().is_none() {
            return Err(Rejection::Truncated);
        }
        if !capture.result.quality.is_good() {
            return Err(Rejection::Flagged(capture.result.quality));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpfp_rs::{CaptureResult, ImageInfo};

    fn capture(len: usize, quality: Quality) -> Capture {
        Capture {
            result: CaptureResult {
                success: true,
                quality,
                score: 0,
                info: ImageInfo {
                    width: 400,
                    height: 500,
                    resolution: 500,
                    bpp: 8,
                },
            },
            format: ImageFormat::Iso19794,
            data: vec![0; len],
        }
    }

    #[test]
    fn nominal_iso_record_passes() {
        assert_eq!(QualityGate::default().check(&capture(200_046, Quality::GOOD)), Ok(()));
    }

    #[test]
    fn size_bounds() {
        let gate = QualityGate::default();
        assert_eq!(
            gate.check(&capture(9_999, Quality::GOOD)),
            Err(Rejection::TooSmall {
                len: 9_999,
                min: 10_000
            })
        );
        assert_eq!(
            gate.check(&capture(200_050, Quality::GOOD)),
            Err(Rejection::TooLarge {
                len: 200_050,
                max: 200_046
            })
        );
    }

    #[test]
    fn bounds_follow_the_envelope() {
        let ansi = QualityGate::for_format(10_000, 200_046, ImageFormat::Ansi381);
        assert_eq!((ansi.min_bytes, ansi.max_bytes), (10_004, 200_050));

        let pixels = QualityGate::for_format(10_000, 200_046, ImageFormat::PixelBuffer);
        assert_eq!((pixels.min_bytes, pixels.max_bytes), (9_954, 200_000));

        let iso = QualityGate::for_format(10_000, 200_046, ImageFormat::Iso19794);
        assert_eq!(iso, QualityGate::default());
    }

    #[test]
    fn short_record_is_truncated() {
        let gate = QualityGate {
            min_bytes: 0,
            max_bytes: usize::MAX,
        };
        assert_eq!(gate.check(&capture(100, Quality::GOOD)), Err(Rejection::Truncated));
    }

    #[test]
    fn reader_flags_reject() {
        let result = QualityGate::default().check(&capture(200_046, Quality::READER_DIRTY));
        assert_eq!(result, Err(Rejection::Flagged(Quality::READER_DIRTY)));
    }
}
