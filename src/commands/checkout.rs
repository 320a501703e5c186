use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Result};

fn git<I, S>(root: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let out = Command::new("git").arg("-C").arg(root).args(args).output()?;

    if !out.status.success() {
        let err = String::from_utf8_lossy(&out.stderr);
        return Err(anyhow!("git exited with {}: {}", out.status, err.trim()));
    }

    Ok(String::from_utf8(out.stdout)?)
}

/// A local clone of the deployment repository
///
/// Wraps the system git binary. The patcher itself never touches version
/// control; everything that does goes through here.
pub struct Checkout {
    root: PathBuf,
}

impl Checkout {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_owned();

        let out = git(&root, ["rev-parse", "--is-inside-work-tree"])?;
        if out.trim() != "true" {
            return Err(anyhow!("not a git work tree: {:?}", root));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pull(&self) -> Result<()> {
        git(&self.root, ["pull", "--ff-only"])?;
        Ok(())
    }

    /// Stages the path and commits it
    ///
    /// Returns false when the path has no changes; nothing is committed.
    pub fn commit(&self, path: &Path, message: &str) -> Result<bool> {
        git(&self.root, [OsStr::new("add"), OsStr::new("--"), path.as_os_str()])?;

        let status = git(
            &self.root,
            [
                OsStr::new("status"),
                OsStr::new("--porcelain"),
                OsStr::new("--"),
                path.as_os_str(),
            ],
        )?;

        if status.trim().is_empty() {
            return Ok(false);
        }

        git(&self.root, ["commit", "-m", message])?;
        Ok(true)
    }

    pub fn push(&self) -> Result<()> {
        git(&self.root, ["push"])?;
        Ok(())
    }
}
