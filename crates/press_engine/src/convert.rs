use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use engine_logging::{engine_debug, engine_info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("converter {0} not found")]
    Unavailable(PathBuf),
    #[error("converter produced no output:\n{output}")]
    Failed { output: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Turns a packaged archive into a device format next to it.
pub trait FormatConverter: Send + Sync {
    /// Extension of the produced file, without the dot.
    fn extension(&self) -> &str;
    fn convert(&self, archive: &Path) -> Result<PathBuf, ConversionError>;
}

/// Runs a `kindlegen`-style binary: `<binary> <archive> <args..>`, output
/// expected as a `.mobi` sibling of the archive.
#[derive(Debug, Clone)]
pub struct KindlegenConverter {
    binary: PathBuf,
    args: Vec<String>,
}

impl KindlegenConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: vec!["-c2".to_string()],
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Full path of the binary; bare names are looked up on `PATH`.
    fn locate(&self) -> Option<PathBuf> {
        if self.binary.components().count() > 1 || self.binary.is_absolute() {
            return self.binary.is_file().then(|| self.binary.clone());
        }
        let path = env::var_os("PATH")?;
        env::split_paths(&path)
            .map(|dir| dir.join(&self.binary))
            .find(|candidate| candidate.is_file())
    }
}

impl Default for KindlegenConverter {
    fn default() -> Self {
        Self::new("kindlegen")
    }
}

impl FormatConverter for KindlegenConverter {
    fn extension(&self) -> &str {
        "mobi"
    }

    fn convert(&self, archive: &Path) -> Result<PathBuf, ConversionError> {
        let binary = self
            .locate()
            .ok_or_else(|| ConversionError::Unavailable(self.binary.clone()))?;
        let target = archive.with_extension(self.extension());
        if target.exists() {
            fs::remove_file(&target)?;
        }

        engine_info!("Converting {} with {}", archive.display(), binary.display());
        let output = Command::new(&binary).arg(archive).args(&self.args).output()?;
        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        engine_debug!("Converter exited with {}", output.status);

        // Exit status is unreliable (warnings give a non-zero code); the file decides.
        if target.exists() {
            Ok(target)
        } else {
            Err(ConversionError::Failed { output: log })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("x.epub");
        fs::write(&archive, b"zip").unwrap();

        let converter = KindlegenConverter::new(dir.path().join("no-such-converter"));
        assert!(matches!(
            converter.convert(&archive),
            Err(ConversionError::Unavailable(_))
        ));
        let bare = KindlegenConverter::new("press-test-no-such-converter-binary");
        assert!(matches!(bare.convert(&archive), Err(ConversionError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn success_is_judged_by_the_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("x.epub");
        fs::write(&archive, b"zip").unwrap();
        let mobi = dir.path().join("x.mobi");

        let copying = KindlegenConverter::new("/bin/cp")
            .with_args(vec![mobi.to_string_lossy().into_owned()]);
        assert_eq!(copying.convert(&archive).unwrap(), mobi);

        let echoing = KindlegenConverter::new("/bin/echo").with_args(vec!["broken".to_string()]);
        match echoing.convert(&archive) {
            Err(ConversionError::Failed { output }) => assert!(output.contains("broken")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!mobi.exists());
    }
}
