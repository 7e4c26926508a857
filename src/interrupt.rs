// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Edge notifications for an open `value` attribute.
//!
//! Sysfs signals an edge by raising `POLLPRI | POLLERR` on the `value`
//! descriptor until it is read again. [`KernelInterrupts`] registers the
//! descriptor with the tokio reactor for [`Interest::PRIORITY`];
//! [`ManualInterrupts`] lets tests decide when edges happen.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

mod manual;

pub use manual::ManualInterrupts;

/// The line's single `value` descriptor, shared between reads and the
/// interrupt registration. Closed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct ValueFd(Rc<File>);

impl ValueFd {
    pub(crate) fn new(file: Rc<File>) -> Self {
        Self(file)
    }
}

impl AsRawFd for ValueFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

/// Source of edge notifications.
pub trait Interrupts {
    /// Start listening on `fd`. Dropping the returned stream deregisters it.
    fn subscribe(&self, fd: ValueFd) -> io::Result<Box<dyn EdgeStream>>;
}

pub trait EdgeStream {
    /// Resolve on the next edge, or with the failure of the mechanism
    fn next_edge(&mut self) -> LocalBoxFuture<'_, io::Result<()>>;

    /// Forget edges latched since the last one was returned
    fn discard(&mut self);
}

/// Edges reported by the kernel through the tokio reactor.
///
/// Must be subscribed from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelInterrupts;

impl Interrupts for KernelInterrupts {
    fn subscribe(&self, fd: ValueFd) -> io::Result<Box<dyn EdgeStream>> {
        let fd = AsyncFd::with_interest(fd, Interest::PRIORITY)?;
        Ok(Box::new(PriorityEdges { fd }))
    }
}

struct PriorityEdges {
    fd: AsyncFd<ValueFd>,
}

impl EdgeStream for PriorityEdges {
    fn next_edge(&mut self) -> LocalBoxFuture<'_, io::Result<()>> {
        async move {
            let mut guard = self.fd.ready(Interest::PRIORITY).await?;
            guard.clear_ready();
            Ok(())
        }
        .boxed_local()
    }

    fn discard(&mut self) {
        if let Some(Ok(mut guard)) = self.fd.ready(Interest::PRIORITY).now_or_never() {
            guard.clear_ready();
        }
    }
}
