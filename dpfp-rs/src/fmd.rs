use tracing::warn;

use crate::{DpfpError, FmdFormat};

/// Tag at the start of ANSI 378 and ISO 19794-2 records.
pub const FMD_MAGIC: &[u8; 3] = b"FMR";

/// Typical size range of a single-view template.
pub const TYPICAL_FMD_SIZE: std::ops::RangeInclusive<usize> = 300..=500;

/// Fingerprint feature template together with its format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fmd {
    format: FmdFormat,
    bytes: Vec<u8>,
}

impl Fmd {
    pub fn new(format: FmdFormat, bytes: Vec<u8>) -> Self {
        Fmd { format, bytes }
    }

    /// Wraps stored bytes, rejecting data that can not be a template of `format`.
    pub fn from_bytes(format: FmdFormat, bytes: Vec<u8>) -> crate::Result<Self> {
        let fmd = Fmd::new(format, bytes);
        fmd.validate()?;

        Ok(fmd)
    }

    pub fn format(&self) -> FmdFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Structural check: non-empty, and standard records carry the `FMR` tag. Sizes outside
    /// the typical single-view range are only logged.
    pub fn validate(&self) -> crate::Result<()> {
        if self.bytes.is_empty() {
            return Err(DpfpError::InvalidTemplate("template is empty".to_string()));
        }

        if self.format.is_interchange() && !self.bytes.starts_with(FMD_MAGIC) {
            return Err(DpfpError::InvalidTemplate(format!(
                "{} template does not start with `FMR`",
                self.format
            )));
        }

        if !self.has_typical_size() {
            warn!(
                size = self.bytes.len(),
                "template size outside the typical {}..={} bytes",
                TYPICAL_FMD_SIZE.start(),
                TYPICAL_FMD_SIZE.end()
            );
        }

        Ok(())
    }

    pub fn has_typical_size(&self) -> bool {
        TYPICAL_FMD_SIZE.contains(&self.bytes.len())
    }
}

impl AsRef<[u8]> for Fmd {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_templates_need_magic() {
        let mut bytes = b"FMR\0".to_vec();
        bytes.resize(320, 7);
        assert!(Fmd::from_bytes(FmdFormat::Ansi378_2004, bytes).is_ok());

        let err = Fmd::from_bytes(FmdFormat::Ansi378_2004, vec![0; 320]).unwrap_err();
        assert!(matches!(err, DpfpError::InvalidTemplate(_)));
    }

    #[test]
    fn vendor_templates_are_not_tag_checked() {
        assert!(Fmd::from_bytes(FmdFormat::DpReg, vec![1; 40]).is_ok());
    }

    #[test]
    fn empty_template_is_rejected() {
        assert!(Fmd::from_bytes(FmdFormat::DpVer, Vec::new()).is_err());
    }

    #[test]
    fn unusual_size_is_accepted() {
        let fmd = Fmd::from_bytes(FmdFormat::Iso19794_2_2005, b"FMR\0tiny".to_vec()).unwrap();
        assert!(!fmd.has_typical_size());
    }
}
