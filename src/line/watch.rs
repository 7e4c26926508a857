// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Interrupt subscriptions of a line.
//!
//! An idle line has no interrupt registration. Arming it spawns a local
//! task that owns the registration and dispatches each edge to the
//! subscribers; the last subscriber to leave aborts the task.
//!
//! With debouncing enabled the task stops listening for the debounce
//! period after each dispatch, then reads the value and discards whatever
//! latched in between before listening again.
//!
//! Any error is delivered once to every subscriber, after which the line
//! is back to idle with no subscribers. Watching again arms it anew.

use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{Edge, Inner, LineValue, Shared};
use crate::errors::{Error, Result};
use crate::interrupt::EdgeStream;

/// What a [`Watcher`] receives for each qualifying edge
pub type WatchResult<'a> = std::result::Result<LineValue, &'a Error>;

/// An interrupt callback.
///
/// Watchers compare by identity: clones of one watcher are equal, two
/// watchers built from identical closures are not.
#[derive(Clone)]
pub struct Watcher(Rc<dyn Fn(WatchResult<'_>)>);

impl Watcher {
    pub fn new(callback: impl Fn(WatchResult<'_>) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    fn call(&self, result: WatchResult<'_>) {
        (self.0)(result)
    }
}

impl PartialEq for Watcher {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }
}

impl Eq for Watcher {}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Watcher")
            .field(&(Rc::as_ptr(&self.0) as *const ()))
            .finish()
    }
}

#[derive(Debug)]
pub(crate) struct Watch {
    pub(crate) edge: Edge,
    debounce: Duration,
    subscribers: Vec<Watcher>,
    task: Option<JoinHandle<()>>,
}

impl Watch {
    pub(crate) fn new(edge: Edge, debounce: Duration) -> Self {
        Self {
            edge,
            debounce,
            subscribers: Vec::new(),
            task: None,
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn remove(&mut self, watcher: &Watcher) {
        self.subscribers.retain(|w| w != watcher);
        if self.subscribers.is_empty() {
            self.disarm();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.subscribers.clear();
        self.disarm();
    }

    fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("interrupt watch disarmed");
        }
    }

    /// Back to idle from within the task, which is about to return
    fn fail(&mut self, pin: u32, err: &Error) -> Vec<Watcher> {
        tracing::debug!("gpio{}: interrupt watch failed: {}", pin, err);
        self.task = None;
        std::mem::take(&mut self.subscribers)
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Add `watcher`, arming the line if it is idle.
///
/// Must be called from within a [`LocalSet`](tokio::task::LocalSet).
pub(super) fn subscribe(shared: &Rc<Shared>, watcher: &Watcher) -> Result<()> {
    let mut inner = shared.inner.borrow_mut();
    inner.lifecycle.ensure_ready("watch")?;
    let state = inner.lifecycle.state();

    let Inner { value, watch, .. } = &mut *inner;
    let (Some(value), Some(watch)) = (value.as_ref(), watch.as_mut()) else {
        return Err(Error::state(shared.pin, "watch", state));
    };

    if !watch.is_armed() {
        let edges = shared.interrupts.subscribe(value.fd()).map_err(Error::notify)?;
        let task = tokio::task::spawn_local(listen(Rc::downgrade(shared), edges));
        tracing::debug!("gpio{}: interrupt watch armed", shared.pin);
        watch.task = Some(task);
    }

    watch.subscribers.push(watcher.clone());
    Ok(())
}

/// Body of the watch task. Never holds the line across an await.
async fn listen(line: Weak<Shared>, mut edges: Box<dyn EdgeStream>) {
    loop {
        let status = edges.next_edge().await;
        let Some(debounce) = line.upgrade().and_then(|shared| dispatch(&shared, status)) else {
            return;
        };
        if debounce.is_zero() {
            continue;
        }

        tokio::time::sleep(debounce).await;
        let rearmed = line
            .upgrade()
            .is_some_and(|shared| rearm(&shared, edges.as_mut()));
        if !rearmed {
            return;
        }
    }
}

/// Deliver one edge. Returns the debounce period, or `None` if the task
/// must stop.
fn dispatch(shared: &Shared, status: std::io::Result<()>) -> Option<Duration> {
    let (result, subscribers) = {
        let mut inner = shared.inner.borrow_mut();
        let Inner { value, watch, .. } = &mut *inner;
        let (Some(value), Some(watch)) = (value.as_mut(), watch.as_mut()) else {
            return None;
        };
        if !watch.is_armed() {
            return None;
        }

        let result = status
            .map_err(Error::notify)
            .and_then(|()| value.read().map_err(Error::from));
        match result {
            Ok(v) if !watch.edge.accepts(v) => return Some(watch.debounce),
            // callbacks may subscribe or unsubscribe while we iterate
            Ok(_) => (result, watch.subscribers.clone()),
            Err(ref err) => {
                let subscribers = watch.fail(shared.pin, err);
                (result, subscribers)
            }
        }
    };

    deliver(&subscribers, &result);
    match result {
        Ok(_) => shared
            .inner
            .borrow()
            .watch
            .as_ref()
            .filter(|w| w.is_armed())
            .map(|w| w.debounce),
        Err(_) => None,
    }
}

/// End of a debounce period: drop edges latched meanwhile and listen again.
/// Subscribers are checked now, not when the period started.
fn rearm(shared: &Shared, edges: &mut dyn EdgeStream) -> bool {
    let (err, subscribers) = {
        let mut inner = shared.inner.borrow_mut();
        let Inner { value, watch, .. } = &mut *inner;
        let (Some(value), Some(watch)) = (value.as_mut(), watch.as_mut()) else {
            return false;
        };
        if !watch.is_armed() || watch.subscribers.is_empty() {
            return false;
        }

        match value.read() {
            Ok(_) => {
                edges.discard();
                tracing::debug!("gpio{}: interrupt watch re-armed", shared.pin);
                return true;
            }
            Err(err) => {
                let err = Error::from(err);
                let subscribers = watch.fail(shared.pin, &err);
                (err, subscribers)
            }
        }
    };

    deliver(&subscribers, &Err(err));
    false
}

fn deliver(subscribers: &[Watcher], result: &Result<LineValue>) {
    for watcher in subscribers {
        match result {
            Ok(value) => watcher.call(Ok(*value)),
            Err(err) => watcher.call(Err(err)),
        }
    }
}
