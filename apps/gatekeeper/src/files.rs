//! Flat files kept next to the database: enrollment templates, per-user metadata, compressed
//! scans and capture dumps.

use std::fs;
use std::path::{Path, PathBuf};

use dpfp_rs::{Fmd, FmdFormat, RawImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{io_error, Error, Result};

const TEMPLATE_PREFIX: &str = "fmd_";
const TEMPLATE_SUFFIX: &str = ".dat";

/// Contents of `user_<id>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub user_id: String,
    pub name: String,
    pub secondary_id: Option<String>,
    /// RFC 3339 timestamp of the enrollment.
    pub enrolled_at: String,
    pub scans_stored: usize,
    pub template: bool,
}

/// Template read back from a `fmd_<id>.dat` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub user_id: String,
    pub path: PathBuf,
    pub fmd: Fmd,
}

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Uses `root` as data directory, creating it when needed.
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<DataDir> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_error(&root))?;

        Ok(DataDir { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// User ids end up in file names, so only a conservative alphabet is accepted.
    pub fn validate_user_id(user_id: &str) -> Result<()> {
        let valid = !user_id.is_empty()
            && user_id.len() <= 64
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(Error::InvalidUserId(user_id.to_string()))
        }
    }

    pub fn template_path(&self, user_id: &str) -> PathBuf {
        self.root
            .join(format!("{}{}{}", TEMPLATE_PREFIX, user_id, TEMPLATE_SUFFIX))
    }

    pub fn metadata_path(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("user_{}.json", user_id))
    }

    pub fn write_template(&self, user_id: &str, fmd: &Fmd) -> Result<PathBuf> {
        let path = self.template_path(user_id);
        write(&path, fmd.as_bytes())?;

        Ok(path)
    }

    pub fn write_metadata(&self, metadata: &UserMetadata) -> Result<PathBuf> {
        let path = self.metadata_path(&metadata.user_id);
        let json = serde_json::to_vec_pretty(metadata)?;
        write(&path, &json)?;

        Ok(path)
    }

    pub fn read_metadata(&self, user_id: &str) -> Result<UserMetadata> {
        let path = self.metadata_path(user_id);
        let json = fs::read(&path).map_err(io_error(&path))?;

        Ok(serde_json::from_slice(&json)?)
    }

    pub fn write_wsq(&self, stem: &str, wsq: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(format!("{}.wsq", stem));
        write(&path, wsq)?;

        Ok(path)
    }

    pub fn dump_raw(&self, stem: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(format!("{}.raw", stem));
        write(&path, data)?;

        Ok(path)
    }

    pub fn dump_png(&self, stem: &str, image: &RawImage) -> Result<PathBuf> {
        let path = self.root.join(format!("{}.png", stem));
        image.save_to_file(&path)?;
        debug!(path = %path.display(), "preview written");

        Ok(path)
    }

    pub fn read_templates(&self, format: FmdFormat) -> Result<Vec<TemplateFile>> {
        read_templates(&self.root, format)
    }
}

/// Reads every `fmd_<id>.dat` in `dir`, ordered by file name. Files that do not hold a
/// valid template are skipped.
pub fn read_templates(dir: &Path, format: FmdFormat) -> Result<Vec<TemplateFile>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if template_user_id(&path).is_some() && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        let user_id = match template_user_id(&path) {
            Some(user_id) => user_id,
            None => continue,
        };
        let bytes = fs::read(&path).map_err(io_error(&path))?;
        match Fmd::from_bytes(format, bytes) {
            Ok(fmd) => templates.push(TemplateFile { user_id, path, fmd }),
            Err(error) => warn!(path = %path.display(), %error, "skipping template file"),
        }
    }

    Ok(templates)
}

fn template_user_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let user_id = name
        .strip_prefix(TEMPLATE_PREFIX)?
        .strip_suffix(TEMPLATE_SUFFIX)?;
    if user_id.is_empty() {
        None
    } else {
        Some(user_id.to_string())
    }
}

fn write(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).map_err(io_error(path))
}
