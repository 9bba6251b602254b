use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(mode);
        fs::set_permissions(path, perm)
            .with_context(|| format!("set permissions {:o} on {}", mode, path.display()))?;
    }
    Ok(())
}

/// A private file created next to its destination before its contents are
/// known. `commit` writes and renames it into place; dropping it uncommitted
/// removes the temp file.
pub struct StagedFile {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    /// Create the temp file with `mode` already applied.
    pub fn create(path: &Path, mode: u32) -> Result<Self> {
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => dir,
            None => Path::new("."),
        };
        let tmp = tempfile::Builder::new()
            .prefix(".etcd-steward-")
            .tempfile_in(dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        set_permissions(tmp.path(), mode)?;
        Ok(Self {
            tmp,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(mut self, contents: &[u8]) -> Result<()> {
        self.tmp.write_all(contents).context("write temp file")?;
        self.tmp.flush().context("flush temp file")?;
        self.tmp
            .persist(&self.path)
            .with_context(|| format!("persist {}", self.path.display()))?;
        Ok(())
    }
}
