use std::convert::TryFrom;
use std::fmt;

use dpfp_sys as sys;

/// Layout of the image returned by a capture.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ImageFormat {
    /// Bare pixel raster.
    PixelBuffer,
    /// ANSI INCITS 381-2004 finger image record.
    Ansi381,
    /// ISO/IEC 19794-4:2005 finger image record.
    Iso19794,
}

impl ImageFormat {
    pub fn raw(self) -> u32 {
        match self {
            ImageFormat::PixelBuffer => sys::DPFPDD_IMG_FMT_PIXEL_BUFFER,
            ImageFormat::Ansi381 => sys::DPFPDD_IMG_FMT_ANSI381,
            ImageFormat::Iso19794 => sys::DPFPDD_IMG_FMT_ISOIEC19794,
        }
    }

    /// Nominal length of the record header and view header in front of the pixels.
    pub fn envelope_len(self) -> usize {
        match self {
            ImageFormat::PixelBuffer => 0,
            ImageFormat::Ansi381 => 50,
            ImageFormat::Iso19794 => 46,
        }
    }

    /// Interchange record type the matching library accepts for images of this format.
    pub fn fid_format(self) -> Option<FidFormat> {
        match self {
            ImageFormat::PixelBuffer => None,
            ImageFormat::Ansi381 => Some(FidFormat::Ansi381_2004),
            ImageFormat::Iso19794 => Some(FidFormat::Iso19794_4_2005),
        }
    }
}

impl Default for ImageFormat {
    fn default() -> Self {
        ImageFormat::Iso19794
    }
}

impl TryFrom<u32> for ImageFormat {
    type Error = crate::DpfpError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            sys::DPFPDD_IMG_FMT_PIXEL_BUFFER => Ok(ImageFormat::PixelBuffer),
            sys::DPFPDD_IMG_FMT_ANSI381 => Ok(ImageFormat::Ansi381),
            sys::DPFPDD_IMG_FMT_ISOIEC19794 => Ok(ImageFormat::Iso19794),
            n => Err(crate::DpfpError::TryFromError(n.into())),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let string = match self {
            ImageFormat::PixelBuffer => "PixelBuffer",
            ImageFormat::Ansi381 => "ANSI 381",
            ImageFormat::Iso19794 => "ISO 19794-4",
        };

        write!(f, "{}", string)
    }
}

/// Image processing applied by the reader before the image is returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ImageProcessing {
    Default,
    /// Processing required for PIV compliance.
    Piv,
    Enhanced,
    Unprocessed,
}

impl ImageProcessing {
    pub fn raw(self) -> u32 {
        match self {
            ImageProcessing::Default => sys::DPFPDD_IMG_PROC_DEFAULT,
            ImageProcessing::Piv => sys::DPFPDD_IMG_PROC_PIV,
            ImageProcessing::Enhanced => sys::DPFPDD_IMG_PROC_ENHANCED,
            ImageProcessing::Unprocessed => sys::DPFPDD_IMG_PROC_UNPROCESSED,
        }
    }
}

impl Default for ImageProcessing {
    fn default() -> Self {
        ImageProcessing::Enhanced
    }
}

impl TryFrom<u32> for ImageProcessing {
    type Error = crate::DpfpError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            sys::DPFPDD_IMG_PROC_DEFAULT => Ok(ImageProcessing::Default),
            sys::DPFPDD_IMG_PROC_PIV => Ok(ImageProcessing::Piv),
            sys::DPFPDD_IMG_PROC_ENHANCED => Ok(ImageProcessing::Enhanced),
            sys::DPFPDD_IMG_PROC_UNPROCESSED => Ok(ImageProcessing::Unprocessed),
            n => Err(crate::DpfpError::TryFromError(n.into())),
        }
    }
}

/// Feature template (FMD) format.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FmdFormat {
    Ansi378_2004,
    Iso19794_2_2005,
    DpPreReg,
    DpReg,
    DpVer,
}

impl FmdFormat {
    pub fn raw(self) -> i32 {
        match self {
            FmdFormat::Ansi378_2004 => sys::DPFJ_FMD_ANSI_378_2004,
            FmdFormat::Iso19794_2_2005 => sys::DPFJ_FMD_ISO_19794_2_2005,
            FmdFormat::DpPreReg => sys::DPFJ_FMD_DP_PRE_REG_FEATURES,
            FmdFormat::DpReg => sys::DPFJ_FMD_DP_REG_FEATURES,
            FmdFormat::DpVer => sys::DPFJ_FMD_DP_VER_FEATURES,
        }
    }

    /// Whether templates of this format are standard records starting with the `FMR` tag.
    pub fn is_interchange(self) -> bool {
        match self {
            FmdFormat::Ansi378_2004 | FmdFormat::Iso19794_2_2005 => true,
            FmdFormat::DpPreReg | FmdFormat::DpReg | FmdFormat::DpVer => false,
        }
    }
}

impl Default for FmdFormat {
    fn default() -> Self {
        FmdFormat::Ansi378_2004
    }
}

impl TryFrom<i32> for FmdFormat {
    type Error = crate::DpfpError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            sys::DPFJ_FMD_ANSI_378_2004 => Ok(FmdFormat::Ansi378_2004),
            sys::DPFJ_FMD_ISO_19794_2_2005 => Ok(FmdFormat::Iso19794_2_2005),
            sys::DPFJ_FMD_DP_PRE_REG_FEATURES => Ok(FmdFormat::DpPreReg),
            sys::DPFJ_FMD_DP_REG_FEATURES => Ok(FmdFormat::DpReg),
            sys::DPFJ_FMD_DP_VER_FEATURES => Ok(FmdFormat::DpVer),
            n => Err(crate::DpfpError::TryFromError(n.into())),
        }
    }
}

impl fmt::Display for FmdFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let string = match self {
            FmdFormat::Ansi378_2004 => "ANSI 378-2004",
            FmdFormat::Iso19794_2_2005 => "ISO 19794-2:2005",
            FmdFormat::DpPreReg => "DigitalPersona pre-registration",
            FmdFormat::DpReg => "DigitalPersona registration",
            FmdFormat::DpVer => "DigitalPersona verification",
        };

        write!(f, "{}", string)
    }
}

/// Finger image (FID) interchange record format.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FidFormat {
    Ansi381_2004,
    Iso19794_4_2005,
}

impl FidFormat {
    pub fn raw(self) -> i32 {
        match self {
            FidFormat::Ansi381_2004 => sys::DPFJ_FID_ANSI_381_2004,
            FidFormat::Iso19794_4_2005 => sys::DPFJ_FID_ISO_19794_4_2005,
        }
    }

    pub fn envelope_len(self) -> usize {
        match self {
            FidFormat::Ansi381_2004 => ImageFormat::Ansi381.envelope_len(),
            FidFormat::Iso19794_4_2005 => ImageFormat::Iso19794.envelope_len(),
        }
    }
}

impl TryFrom<i32> for FidFormat {
    type Error = crate::DpfpError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            sys::DPFJ_FID_ANSI_381_2004 => Ok(FidFormat::Ansi381_2004),
            sys::DPFJ_FID_ISO_19794_4_2005 => Ok(FidFormat::Iso19794_4_2005),
            n => Err(crate::DpfpError::TryFromError(n.into())),
        }
    }
}

/// WSQ implementation used by the compression library.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CompressionAlgorithm {
    Nist,
    Aware,
}

impl CompressionAlgorithm {
    pub fn raw(self) -> i32 {
        match self {
            CompressionAlgorithm::Nist => sys::DPFJ_COMPRESSION_WSQ_NIST,
            CompressionAlgorithm::Aware => sys::DPFJ_COMPRESSION_WSQ_AWARE,
        }
    }
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        CompressionAlgorithm::Nist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_format_round_trips_native_values() {
        assert_eq!(ImageFormat::try_from(0x01010007).unwrap(), ImageFormat::Iso19794);
        assert_eq!(ImageFormat::Ansi381.raw(), 0x001B0401);
        assert!(ImageFormat::try_from(7).is_err());
    }

    #[test]
    fn envelope_lengths() {
        assert_eq!(ImageFormat::Iso19794.envelope_len(), 46);
        assert_eq!(ImageFormat::Ansi381.envelope_len(), 50);
        assert_eq!(ImageFormat::PixelBuffer.envelope_len(), 0);
        assert_eq!(ImageFormat::PixelBuffer.fid_format(), None);
    }

    #[test]
    fn only_standard_templates_are_interchange_records() {
        assert!(FmdFormat::Ansi378_2004.is_interchange());
        assert!(!FmdFormat::DpReg.is_interchange());
        assert_eq!(FmdFormat::try_from(1).unwrap(), FmdFormat::DpReg);
    }
}
