// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Waiting for an exported line to materialize.
//!
//! Writing to `export` only asks the kernel to create `gpio<N>/`. The
//! directory, its attributes, and the udev rules that usually fix their
//! ownership and mode all land some time later. Until then opening or
//! writing an attribute fails with `ENOENT` or `EACCES`. The wait sleeps
//! on the tokio timer, so other tasks keep running in the meantime.

use std::path::PathBuf;
use std::time::Duration;

use nix::errno::Errno;
use nix::unistd::{access, AccessFlags};

use crate::errors::{ErrorKind, HandshakeStage, Result};
use crate::sysfs::LinePaths;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of checks before giving up, at least one is always made
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT: Self = Self {
        attempts: 40,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(100),
    };

    pub const fn new(attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            attempts,
            initial_backoff,
            max_backoff,
        }
    }

    /// Delay after the `retry`-th failed check (zero based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Wait until the control directory of `pin` and the attributes needed to
/// configure it exist and are readable and writable.
///
/// `value` and `direction` are always required. `edge` is only waited for
/// when an edge was requested: lines that cannot interrupt never get one.
pub(crate) async fn wait_for_line(
    pin: u32,
    paths: &LinePaths,
    edge: bool,
    policy: &RetryPolicy,
) -> Result<()> {
    let mut required = vec![paths.value(), paths.direction()];
    if edge {
        required.push(paths.edge());
    }

    let mut retry = 0;
    loop {
        let Some((path, stage)) = pending(paths, &required) else {
            if retry > 0 {
                tracing::debug!("gpio{} ready after {} retries", pin, retry);
            }
            return Ok(());
        };

        if retry + 1 >= policy.attempts.max(1) {
            return Err(ErrorKind::HandshakeTimeout { pin, path, stage }.into());
        }

        let delay = policy.backoff(retry);
        tracing::debug!(
            "gpio{}: {} ({}), retrying in {:?}",
            pin,
            path.display(),
            stage,
            delay
        );
        tokio::time::sleep(delay).await;
        retry += 1;
    }
}

/// First thing still missing, if any
fn pending(paths: &LinePaths, required: &[PathBuf]) -> Option<(PathBuf, HandshakeStage)> {
    if !paths.dir().is_dir() {
        return Some((paths.dir().to_path_buf(), HandshakeStage::DirectoryMissing));
    }

    for path in required {
        match access(path.as_path(), AccessFlags::R_OK | AccessFlags::W_OK) {
            Ok(()) => {}
            Err(Errno::ENOENT) => return Some((path.clone(), HandshakeStage::FileMissing)),
            Err(errno) => return Some((path.clone(), HandshakeStage::NotAccessible(errno))),
        }
    }

    None
}
