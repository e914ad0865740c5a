// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Advisory single-session lock.
//!
//! Keeps two local client instances from joining as the same user. The lock
//! is a file named after the user id; creating it with `create_new` is the
//! acquire step and removing it is the release. The server's `denied`
//! response remains the real uniqueness guarantee.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

/// Held lock for one user's session. Released on drop.
#[derive(Debug)]
pub struct SessionGuard {
    path: PathBuf,
}

impl SessionGuard {
    /// Try to take the lock for `user_id` in `dir`.
    ///
    /// Returns `Ok(None)` if another instance already holds it.
    pub fn acquire(dir: &Path, user_id: &str) -> io::Result<Option<Self>> {
        fs::create_dir_all(dir)?;
        let path = Self::lock_path(dir, user_id);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                info!("Acquired session lock {}", path.display());
                Ok(Some(Self { path }))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!(
                    "Session for '{}' is already active (lock file {})",
                    user_id,
                    path.display()
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Take the lock even if a lock file exists, e.g. one left behind by a
    /// process that did not shut down cleanly.
    pub fn force_acquire(dir: &Path, user_id: &str) -> io::Result<Self> {
        let path = Self::lock_path(dir, user_id);
        match fs::remove_file(&path) {
            Ok(()) => warn!("Removed existing session lock {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        Self::acquire(dir, user_id)?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("session lock {} was re-created concurrently", path.display()),
            )
        })
    }

    /// Lock file location for a user id. Characters outside `[A-Za-z0-9_-]`
    /// are replaced so the id cannot escape `dir`.
    #[must_use]
    pub fn lock_path(dir: &Path, user_id: &str) -> PathBuf {
        let name: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        dir.join(format!("{name}.session"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Released session lock {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove session lock {}: {}", self.path.display(), e),
        }
    }
}
