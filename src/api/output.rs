//! Persisting signed documents.

use crate::config::SigningContext;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Filename pattern for signed output, in the context's local time.
pub const FILE_NAME_FORMAT: &str = "%d-%m-%YT%H-%M-%S";

/// Where a signed document ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedOutput {
    /// File name only
    pub file_name: String,
    /// Absolute path of the written file
    pub file_path: PathBuf,
}

/// Write `signed` into `output_dir` under a timestamp-derived name.
///
/// The bytes go to a temporary file in the same directory which is renamed
/// into place only once fully written, so a failure leaves nothing behind.
/// A file already present under the generated name is never overwritten; the
/// new name gets a short random suffix instead.
pub fn finalize(ctx: &SigningContext, signed: &[u8], output_dir: &Path) -> Result<SignedOutput> {
    fs::create_dir_all(output_dir).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("cannot create output directory {}: {}", output_dir.display(), e),
        ))
    })?;
    let dir = fs::canonicalize(output_dir)?;

    let stem = ctx.now().format(FILE_NAME_FORMAT).to_string();
    let mut file_name = format!("{}.pdf", stem);
    if dir.join(&file_name).exists() {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        file_name = format!("{}-{}.pdf", stem, &suffix[..8]);
        log::warn!("Output name {}.pdf already taken, using {}", stem, file_name);
    }
    let file_path = dir.join(&file_name);

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(signed)?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(&file_path).map_err(|e| Error::Io(e.error))?;

    log::info!("Wrote {} bytes to {}", signed.len(), file_path.display());
    Ok(SignedOutput {
        file_name,
        file_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FixedClock, SigningConfig};
    use chrono::DateTime;

    fn ctx() -> SigningContext {
        let now = DateTime::parse_from_rfc3339("2024-03-05T07:08:09+01:00").unwrap();
        SigningContext::new(SigningConfig::default()).with_clock(FixedClock(now))
    }

    #[test]
    fn test_name_from_clock() {
        let dir = tempfile::tempdir().unwrap();
        let out = finalize(&ctx(), b"%PDF-1.7 signed", dir.path()).unwrap();

        assert_eq!(out.file_name, "05-03-2024T07-08-09.pdf");
        assert!(out.file_path.is_absolute());
        assert_eq!(fs::read(&out.file_path).unwrap(), b"%PDF-1.7 signed");
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let out = finalize(&ctx(), b"data", &nested).unwrap();
        assert!(out.file_path.starts_with(fs::canonicalize(&nested).unwrap()));
    }

    #[test]
    fn test_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let first = finalize(&ctx(), b"one", dir.path()).unwrap();
        let second = finalize(&ctx(), b"two", dir.path()).unwrap();

        assert_ne!(first.file_path, second.file_path);
        assert!(second.file_name.starts_with("05-03-2024T07-08-09-"));
        assert_eq!(fs::read(&first.file_path).unwrap(), b"one");
        assert_eq!(fs::read(&second.file_path).unwrap(), b"two");
    }

    #[test]
    fn test_no_temporary_files_left() {
        let dir = tempfile::tempdir().unwrap();
        finalize(&ctx(), b"data", dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
