use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::engine_debug;
use tempfile::NamedTempFile;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

pub const MIMETYPE: &str = "application/epub+zip";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
}

/// Zips everything below `workdir` into `target`, replacing it.
///
/// The `mimetype` entry comes first and uncompressed; the other entries follow
/// in sorted order with a fixed timestamp, so equal trees give equal archives.
pub fn archive_dir(workdir: &Path, target: &Path) -> Result<PathBuf, ArchiveError> {
    if !workdir.is_dir() {
        return Err(ArchiveError::NotADirectory(workdir.to_path_buf()));
    }
    let mut entries = Vec::new();
    collect_files(workdir, workdir, &mut entries)?;
    entries.retain(|(name, _)| name != "mimetype");
    entries.sort();

    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    {
        let mut zip = ZipWriter::new(tmp.as_file_mut());
        let stored = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default());
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        zip.start_file("mimetype", stored)?;
        zip.write_all(MIMETYPE.as_bytes())?;
        for (name, path) in &entries {
            engine_debug!("Adding {} to {}", name, target.display());
            zip.start_file(name.as_str(), deflated)?;
            zip.write_all(&fs::read(path)?)?;
        }
        zip.finish()?;
    }
    tmp.as_file_mut().sync_all()?;

    if target.exists() {
        fs::remove_file(target)?;
    }
    tmp.persist(target).map_err(|e| ArchiveError::Io(e.error))?;
    Ok(target.to_path_buf())
}

/// Files below `dir` as (`/`-separated name relative to `root`, full path).
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push((name, path));
        }
    }
    Ok(())
}
