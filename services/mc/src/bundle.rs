//! Skill bundles.
//!
//! A deployable skill is a pair of files in the skills directory, the script
//! `<name>.js` and its manifest `<name>.json`. Both are zipped in memory and
//! uploaded as `<name>.zip`.

use misty_types::SkillUpload;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zip::{CompressionMethod, ZipWriter, result::ZipError, write::SimpleFileOptions};

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Skill file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to build skill archive: {0}")]
    Zip(#[from] ZipError),
    #[error("Failed to write skill archive: {0}")]
    Write(#[from] std::io::Error),
}

/// Zips `<name>.js` and `<name>.json` from `skills_dir` into an upload that
/// overwrites any installed copy without starting it.
pub fn build_bundle(skills_dir: &Path, name: &str) -> Result<SkillUpload, BundleError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for extension in ["js", "json"] {
        let file_name = format!("{}.{}", name, extension);
        let contents = read_skill_file(&skills_dir.join(&file_name))?;
        writer.start_file(file_name, options)?;
        writer.write_all(&contents)?;
    }

    let bytes = writer.finish()?.into_inner();
    debug!(skill = name, size = bytes.len(), "Skill bundle built.");

    Ok(SkillUpload {
        file_name: format!("{}.zip", name),
        bytes,
        immediately_apply: false,
        overwrite_existing: true,
    })
}

fn read_skill_file(path: &Path) -> Result<Vec<u8>, BundleError> {
    std::fs::read(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => BundleError::Missing(path.to_path_buf()),
        _ => BundleError::Read {
            path: path.to_path_buf(),
            source,
        },
    })
}
