//! Scoped staging of the raw service-account payload on local disk.
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Variable the authentication layer reads to locate the key file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// A credential file that exists for as long as this guard is alive.
///
/// Dropping the guard removes the file and unsets [`CREDENTIALS_ENV`] if it
/// still points at it, whichever way the run ended.
#[derive(Debug)]
pub struct StagedCredentials {
    path: PathBuf,
    exported: bool,
}

impl StagedCredentials {
    /// Write `payload` to `path` and export the absolute path through
    /// [`CREDENTIALS_ENV`].
    pub fn stage(path: &Path, payload: &str) -> io::Result<Self> {
        let mut staged = Self::write(path, payload)?;
        env::set_var(CREDENTIALS_ENV, &staged.path);
        staged.exported = true;
        debug!(path = %staged.path.display(), "exported {}", CREDENTIALS_ENV);
        Ok(staged)
    }

    /// Write `payload` to `path` without touching the environment.
    pub fn write(path: &Path, payload: &str) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        // Guard exists from here on, so any later failure still removes the file.
        let mut staged = Self {
            path: path.to_path_buf(),
            exported: false,
        };
        file.write_all(payload.as_bytes())?;
        file.sync_all()?;
        drop(file);
        staged.path = fs::canonicalize(path)?;
        debug!(path = %staged.path.display(), "staged service account credentials");
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedCredentials {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(?err, path = %self.path.display(), "failed to remove staged credentials");
            }
        }
        if self.exported && env::var_os(CREDENTIALS_ENV).as_deref() == Some(self.path.as_os_str()) {
            env::remove_var(CREDENTIALS_ENV);
        }
    }
}
