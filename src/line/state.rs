// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::errors::{Error, Result};

/// Where a [`Line`](super::Line) is in its life.
///
/// ```text
/// Uninitialized -> Initializing -> Ready -> Unexported
/// ```
///
/// `Unexported` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Uninitialized,
    Initializing,
    Ready,
    Unexported,
}

impl std::fmt::Display for LineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LineState::Uninitialized => "uninitialized",
            LineState::Initializing => "initializing",
            LineState::Ready => "ready",
            LineState::Unexported => "unexported",
        })
    }
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    pin: u32,
    state: LineState,
}

impl Lifecycle {
    pub(crate) const fn new(pin: u32) -> Self {
        Self {
            pin,
            state: LineState::Uninitialized,
        }
    }

    pub(crate) const fn state(&self) -> LineState {
        self.state
    }

    /// Returns `Ok(false)` when initialization already started or finished.
    pub(crate) fn begin_init(&mut self) -> Result<bool> {
        match self.state {
            LineState::Uninitialized => {
                self.state = LineState::Initializing;
                Ok(true)
            }
            LineState::Initializing | LineState::Ready => Ok(false),
            LineState::Unexported => Err(Error::state(self.pin, "initialize", self.state)),
        }
    }

    pub(crate) fn finish_init(&mut self) {
        debug_assert_eq!(self.state, LineState::Initializing);
        self.state = LineState::Ready;
    }

    /// A failed init leaves the line as it was so it can be retried.
    pub(crate) fn abort_init(&mut self) {
        debug_assert_eq!(self.state, LineState::Initializing);
        self.state = LineState::Uninitialized;
    }

    pub(crate) fn ensure_ready(&self, op: &'static str) -> Result<()> {
        match self.state {
            LineState::Ready => Ok(()),
            state => Err(Error::state(self.pin, op, state)),
        }
    }

    /// Attribute access works in any state but the terminal one.
    pub(crate) fn ensure_exported(&self, op: &'static str) -> Result<()> {
        match self.state {
            LineState::Unexported => Err(Error::state(self.pin, op, self.state)),
            _ => Ok(()),
        }
    }

    pub(crate) fn begin_unexport(&mut self) -> Result<()> {
        match self.state {
            LineState::Uninitialized | LineState::Ready => {
                self.state = LineState::Unexported;
                Ok(())
            }
            state => Err(Error::state(self.pin, "unexport", state)),
        }
    }
}
