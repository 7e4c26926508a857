// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Paths and raw attribute access for the legacy sysfs GPIO interface.
//!
//! The kernel documents the layout in
//! [Documentation/ABI/obsolete/sysfs-gpio]. Writing a line number to
//! `export` asks the kernel to create `gpio<N>/`; the directory and its
//! attributes show up asynchronously, see [`crate::line::handshake`].
//!
//! [Documentation/ABI/obsolete/sysfs-gpio]: https://www.kernel.org/doc/Documentation/ABI/obsolete/sysfs-gpio

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use nix::unistd::{access, AccessFlags};

use crate::errors::{Error, Result};

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// The root of a sysfs GPIO tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new(SYSFS_GPIO_ROOT)
    }
}

impl Sysfs {
    /// Use a GPIO tree rooted somewhere other than `/sys/class/gpio`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if the export interface exists and this process may write to it
    pub fn is_accessible(&self) -> bool {
        access(self.root.join("export").as_path(), AccessFlags::W_OK).is_ok()
    }

    pub fn line(&self, pin: u32) -> LinePaths {
        LinePaths {
            dir: self.root.join(format!("gpio{pin}")),
        }
    }

    pub fn is_exported(&self, pin: u32) -> bool {
        self.line(pin).dir().is_dir()
    }

    pub fn export(&self, pin: u32) -> Result<()> {
        tracing::debug!("exporting gpio{}", pin);
        write_attr(&self.root.join("export"), &pin.to_string())
            .map_err(|e| Error::from_write(e, "export"))
    }

    pub fn unexport(&self, pin: u32) -> Result<()> {
        tracing::debug!("unexporting gpio{}", pin);
        write_attr(&self.root.join("unexport"), &pin.to_string())
            .map_err(|e| Error::from_write(e, "unexport"))
    }
}

/// Control entries of a single exported line (`<root>/gpio<N>/...`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePaths {
    dir: PathBuf,
}

impl LinePaths {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn value(&self) -> PathBuf {
        self.dir.join("value")
    }

    pub fn direction(&self) -> PathBuf {
        self.dir.join("direction")
    }

    pub fn edge(&self) -> PathBuf {
        self.dir.join("edge")
    }

    pub fn active_low(&self) -> PathBuf {
        self.dir.join("active_low")
    }
}

/// Read an attribute, trimmed of surrounding whitespace.
pub(crate) fn read_attr(path: &Path) -> std::io::Result<String> {
    let mut s = String::new();
    File::open(path)?.read_to_string(&mut s)?;
    Ok(s.trim().to_owned())
}

/// Sysfs attributes must already exist; never create them.
pub(crate) fn write_attr(path: &Path, value: &str) -> std::io::Result<()> {
    let mut f = OpenOptions::new().write(true).truncate(true).open(path)?;
    f.write_all(value.as_bytes())
}
