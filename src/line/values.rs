// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::rc::Rc;

use crate::interrupt::ValueFd;

/// Logical value of a line.
///
/// The kernel applies `active_low` before userspace sees the value, so
/// `Active` reads back as `1` regardless of the voltage that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineValue {
    Inactive,
    Active,
}

impl LineValue {
    pub const HIGH: Self = Self::Active;
    pub const LOW: Self = Self::Inactive;

    pub const fn new(is_active: bool) -> Self {
        if is_active {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    pub const fn is_active(&self) -> bool {
        matches!(self, LineValue::Active)
    }

    pub const fn as_u8(&self) -> u8 {
        match self {
            LineValue::Active => 1,
            LineValue::Inactive => 0,
        }
    }
}

impl From<bool> for LineValue {
    fn from(is_active: bool) -> Self {
        Self::new(is_active)
    }
}

/// Any non-zero value is active.
impl From<u8> for LineValue {
    fn from(value: u8) -> Self {
        Self::new(value != 0)
    }
}

impl From<LineValue> for u8 {
    fn from(value: LineValue) -> Self {
        value.as_u8()
    }
}

impl From<LineValue> for bool {
    fn from(value: LineValue) -> Self {
        value.is_active()
    }
}

impl std::fmt::Display for LineValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// The open `value` attribute of an exported line.
#[derive(Debug)]
pub(crate) struct ValueFile {
    file: Rc<File>,
    buf: [u8; 1],
}

impl ValueFile {
    const ACTIVE: &'static [u8; 1] = b"1";
    const INACTIVE: &'static [u8; 1] = b"0";

    pub(crate) fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file: Rc::new(file),
            buf: [0; 1],
        })
    }

    /// Read the first byte of the attribute.
    ///
    /// Reading also clears a pending sysfs notification on this descriptor.
    pub(crate) fn read(&mut self) -> std::io::Result<LineValue> {
        let n = self.file.read_at(&mut self.buf, 0)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "value attribute is empty",
            ));
        }
        Ok(LineValue::new(self.buf[0] == Self::ACTIVE[0]))
    }

    pub(crate) fn write(&self, value: LineValue) -> std::io::Result<()> {
        let byte = if value.is_active() {
            Self::ACTIVE
        } else {
            Self::INACTIVE
        };
        self.file.write_all_at(byte, 0)
    }
}

impl ValueFile {
    /// The same descriptor, for interrupt registration
    pub(crate) fn fd(&self) -> ValueFd {
        ValueFd::new(self.file.clone())
    }
}
