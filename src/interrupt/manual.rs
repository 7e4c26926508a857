// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::cell::Cell;
use std::io;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tokio::sync::Notify;

use super::{EdgeStream, Interrupts, ValueFd};

/// Interrupts raised by hand, for exercising watchers without hardware.
///
/// Clones share state, so a test keeps one and hands the other to the
/// line. Edges are latched like the kernel latches them: they wait for the
/// next [`EdgeStream::next_edge`] until discarded.
#[derive(Debug, Clone, Default)]
pub struct ManualInterrupts {
    state: Rc<State>,
}

#[derive(Debug, Default)]
struct State {
    subscribers: Cell<usize>,
    pending: Cell<usize>,
    failure: Cell<Option<io::ErrorKind>>,
    notify: Notify,
}

impl ManualInterrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise an edge. Returns false, losing the edge, if nobody listens.
    pub fn trigger(&self) -> bool {
        let state = &self.state;
        if state.subscribers.get() == 0 {
            return false;
        }
        state.pending.set(state.pending.get() + 1);
        state.notify.notify_one();
        true
    }

    /// Make the mechanism itself fail the next wait
    pub fn fail_next(&self, kind: io::ErrorKind) {
        self.state.failure.set(Some(kind));
        self.state.notify.notify_one();
    }

    /// Number of live registrations
    pub fn subscribers(&self) -> usize {
        self.state.subscribers.get()
    }

    /// Edges raised but not yet delivered or discarded
    pub fn pending(&self) -> usize {
        self.state.pending.get()
    }
}

impl Interrupts for ManualInterrupts {
    fn subscribe(&self, _fd: ValueFd) -> io::Result<Box<dyn EdgeStream>> {
        let state = self.state.clone();
        state.subscribers.set(state.subscribers.get() + 1);
        Ok(Box::new(ManualEdges { state }))
    }
}

struct ManualEdges {
    state: Rc<State>,
}

impl EdgeStream for ManualEdges {
    fn next_edge(&mut self) -> LocalBoxFuture<'_, io::Result<()>> {
        async move {
            loop {
                if let Some(kind) = self.state.failure.take() {
                    return Err(io::Error::new(kind, "interrupt source failed"));
                }
                let pending = self.state.pending.get();
                if pending > 0 {
                    self.state.pending.set(pending - 1);
                    return Ok(());
                }
                self.state.notify.notified().await;
            }
        }
        .boxed_local()
    }

    fn discard(&mut self) {
        self.state.pending.set(0);
    }
}

impl Drop for ManualEdges {
    fn drop(&mut self) {
        self.state.subscribers.set(self.state.subscribers.get() - 1);
        self.state.pending.set(0);
    }
}
