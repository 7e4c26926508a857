// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tokio::task::JoinHandle;

use crate::errors::{Error, Result};
use crate::interrupt::{Interrupts, KernelInterrupts};
use crate::sysfs::{self, LinePaths, Sysfs};

pub mod handshake;
pub mod options;
mod state;
mod values;
mod watch;

pub use handshake::RetryPolicy;
pub use options::{Direction, Edge, LineConfig, LineOptions};
pub use state::LineState;
pub use values::LineValue;
pub use watch::{WatchResult, Watcher};

use state::Lifecycle;
use values::ValueFile;
use watch::Watch;

/// A single exported GPIO line.
///
/// Constructing a `Line` exports the pin if needed; [`Line::init`] waits
/// for the kernel to finish exporting, applies the configuration and opens
/// the `value` attribute. Reads, writes and watches need an initialized
/// line, [`Line::unexport`] releases it for good.
///
/// A line is not `Send`. The asynchronous operations spawn local tasks and
/// must run inside a [`LocalSet`](tokio::task::LocalSet).
pub struct Line {
    shared: Rc<Shared>,
}

struct Shared {
    pin: u32,
    sysfs: Sysfs,
    paths: LinePaths,
    config: LineConfig,
    previously_exported: bool,
    interrupts: Box<dyn Interrupts>,
    inner: RefCell<Inner>,
}

struct Inner {
    lifecycle: Lifecycle,
    // dropped before `value` so the watch task is aborted first
    watch: Option<Watch>,
    value: Option<ValueFile>,
    report: ConfigReport,
}

/// Configuration writes [`Line::init`] could not apply.
///
/// Controllers differ in which attributes they accept for which lines (an
/// output-only line has no usable `edge`, some drivers refuse
/// `active_low`), so init records these failures instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    skipped: Vec<SkippedWrite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedWrite {
    pub attribute: &'static str,
    pub value: String,
    pub error: String,
}

impl ConfigReport {
    /// True if every attribute was written
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn skipped(&self) -> &[SkippedWrite] {
        &self.skipped
    }

    fn record(&mut self, pin: u32, attribute: &'static str, value: &str, res: Result<()>) {
        if let Err(err) = res {
            tracing::warn!("gpio{}: could not set {} to {}: {}", pin, attribute, value, err);
            self.skipped.push(SkippedWrite {
                attribute,
                value: value.to_owned(),
                error: err.to_string(),
            });
        }
    }
}

impl Line {
    /// Claim `pin` under `/sys/class/gpio`
    pub fn new(pin: u32, config: LineConfig) -> Result<Self> {
        Self::with_sysfs(Sysfs::default(), pin, config)
    }

    /// Claim `pin` in the GPIO tree rooted at `sysfs`, exporting it unless
    /// its control directory already exists.
    pub fn with_sysfs(sysfs: Sysfs, pin: u32, config: LineConfig) -> Result<Self> {
        Self::with_interrupts(sysfs, KernelInterrupts, pin, config)
    }

    /// Like [`Line::with_sysfs`], taking edges from `interrupts` instead of
    /// the kernel.
    pub fn with_interrupts(
        sysfs: Sysfs,
        interrupts: impl Interrupts + 'static,
        pin: u32,
        config: LineConfig,
    ) -> Result<Self> {
        let paths = sysfs.line(pin);
        let previously_exported = paths.dir().is_dir();
        if !previously_exported {
            sysfs.export(pin)?;
        }

        Ok(Self {
            shared: Rc::new(Shared {
                pin,
                sysfs,
                paths,
                config,
                previously_exported,
                interrupts: Box::new(interrupts),
                inner: RefCell::new(Inner {
                    lifecycle: Lifecycle::new(pin),
                    watch: None,
                    value: None,
                    report: ConfigReport::default(),
                }),
            }),
        })
    }

    pub fn pin(&self) -> u32 {
        self.shared.pin
    }

    pub fn state(&self) -> LineState {
        self.shared.inner.borrow().lifecycle.state()
    }

    pub fn config(&self) -> LineConfig {
        self.shared.config
    }

    pub fn options(&self) -> LineOptions {
        self.shared.config.options()
    }

    /// Control directory of this line
    pub fn path(&self) -> &Path {
        self.shared.paths.dir()
    }

    /// Attributes init failed to write, empty until init succeeded
    pub fn config_report(&self) -> ConfigReport {
        self.shared.inner.borrow().report.clone()
    }

    /// Finish exporting and configure the line.
    ///
    /// Waits for the control files, writes `direction`, `edge` and
    /// `active_low` (failures end up in [`Line::config_report`]), opens
    /// `value` and reads it once to clear any interrupt latched before
    /// anyone was listening. Calling it again is a no-op.
    ///
    /// A failed or cancelled init leaves the line uninitialized, ready to be
    /// retried.
    pub async fn init(&self) -> Result<()> {
        if !self.shared.inner.borrow_mut().lifecycle.begin_init()? {
            return Ok(());
        }

        let mut pending = PendingInit {
            shared: &self.shared,
            done: false,
        };
        let (value, report) = self.shared.configure().await?;

        let mut inner = self.shared.inner.borrow_mut();
        let config = &self.shared.config;
        inner.value = Some(value);
        inner.watch = Some(Watch::new(
            config.edge.unwrap_or_default(),
            config.debounce,
        ));
        inner.report = report;
        inner.lifecycle.finish_init();
        pending.done = true;
        tracing::debug!("gpio{} ready", self.shared.pin);
        Ok(())
    }

    pub fn read_sync(&self) -> Result<LineValue> {
        self.shared.read_value()
    }

    /// Read the value from a local task.
    ///
    /// The read happens once the task runs, whether or not the handle is
    /// awaited.
    pub fn read(&self) -> JoinHandle<Result<LineValue>> {
        let pin = self.shared.pin;
        let line = Rc::downgrade(&self.shared);
        tokio::task::spawn_local(async move {
            match line.upgrade() {
                Some(shared) => shared.read_value(),
                None => Err(Error::state(pin, "read", LineState::Unexported)),
            }
        })
    }

    pub fn write_sync(&self, value: impl Into<LineValue>) -> Result<()> {
        self.shared.write_value(value.into())
    }

    /// Write the value from a local task, see [`Line::read`]
    pub fn write(&self, value: impl Into<LineValue>) -> JoinHandle<Result<()>> {
        let value = value.into();
        let pin = self.shared.pin;
        let line = Rc::downgrade(&self.shared);
        tokio::task::spawn_local(async move {
            match line.upgrade() {
                Some(shared) => shared.write_value(value),
                None => Err(Error::state(pin, "write", LineState::Unexported)),
            }
        })
    }

    /// Call `watcher` for every interrupt on this line.
    ///
    /// Watching the same watcher twice calls it twice per interrupt. The
    /// first watcher spawns the local task that listens for edges.
    pub fn watch(&self, watcher: &Watcher) -> Result<()> {
        watch::subscribe(&self.shared, watcher)
    }

    /// Remove every registration of `watcher`
    pub fn unwatch(&self, watcher: &Watcher) {
        if let Some(watch) = self.shared.inner.borrow_mut().watch.as_mut() {
            watch.remove(watcher);
        }
    }

    pub fn unwatch_all(&self) {
        if let Some(watch) = self.shared.inner.borrow_mut().watch.as_mut() {
            watch.clear();
        }
    }

    /// True while a task listens for interrupts on this line
    pub fn is_watched(&self) -> bool {
        let inner = self.shared.inner.borrow();
        inner.watch.as_ref().is_some_and(Watch::is_armed)
    }

    pub fn watcher_count(&self) -> usize {
        let inner = self.shared.inner.borrow();
        inner.watch.as_ref().map_or(0, Watch::len)
    }

    pub fn direction(&self) -> Result<Direction> {
        let s = self
            .shared
            .read_attr("get direction", &self.shared.paths.direction())?;
        s.parse()
    }

    pub fn set_direction(&self, direction: Direction) -> Result<()> {
        self.shared.ensure_exported("set direction")?;
        self.shared.write_direction(direction)
    }

    pub fn edge(&self) -> Result<Edge> {
        let s = self.shared.read_attr("get edge", &self.shared.paths.edge())?;
        s.parse()
    }

    pub fn set_edge(&self, edge: Edge) -> Result<()> {
        self.shared.ensure_exported("set edge")?;
        self.shared.write_edge(edge)?;
        if let Some(watch) = self.shared.inner.borrow_mut().watch.as_mut() {
            watch.edge = edge;
        }
        Ok(())
    }

    pub fn active_low(&self) -> Result<bool> {
        let s = self
            .shared
            .read_attr("get active_low", &self.shared.paths.active_low())?;
        match s.as_str() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(Error::invalid_argument(format!(
                "unexpected active_low value {other:?}"
            ))),
        }
    }

    pub fn set_active_low(&self, invert: bool) -> Result<()> {
        self.shared.ensure_exported("set active_low")?;
        self.shared.write_active_low(invert)
    }

    /// Stop watching, close the value descriptor and ask the kernel to
    /// unexport the pin.
    ///
    /// Some platforms manage exports themselves and refuse the unexport
    /// request; that refusal is logged and ignored. Unexporting twice is an
    /// error.
    pub fn unexport(&self) -> Result<()> {
        let value = {
            let mut inner = self.shared.inner.borrow_mut();
            inner.lifecycle.begin_unexport()?;
            if let Some(mut watch) = inner.watch.take() {
                watch.clear();
            }
            inner.value.take()
        };
        drop(value);

        if let Err(err) = self.shared.sysfs.unexport(self.shared.pin) {
            tracing::warn!("gpio{}: unexport refused: {}", self.shared.pin, err);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("pin", &self.shared.pin)
            .field("path", &self.shared.paths.dir())
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    /// Handshake, best-effort configuration and opening `value`
    async fn configure(&self) -> Result<(ValueFile, ConfigReport)> {
        let config = &self.config;
        handshake::wait_for_line(
            self.pin,
            &self.paths,
            config.edge.is_some(),
            &config.handshake,
        )
        .await?;

        let mut report = ConfigReport::default();
        if !self.previously_exported || config.reconfigure_direction {
            let direction = config.direction;
            report.record(
                self.pin,
                "direction",
                direction.as_sysfs(),
                self.write_direction(direction),
            );
        }
        if let Some(edge) = config.edge {
            report.record(self.pin, "edge", edge.as_sysfs(), self.write_edge(edge));
        }
        report.record(
            self.pin,
            "active_low",
            active_low_token(config.active_low),
            self.write_active_low(config.active_low),
        );

        let mut value = ValueFile::open(&self.paths.value())?;
        value.read()?;
        Ok((value, report))
    }

    fn ensure_exported(&self, op: &'static str) -> Result<()> {
        self.inner.borrow().lifecycle.ensure_exported(op)
    }

    fn read_value(&self) -> Result<LineValue> {
        let mut inner = self.inner.borrow_mut();
        inner.lifecycle.ensure_ready("read")?;
        let state = inner.lifecycle.state();
        let value = inner
            .value
            .as_mut()
            .ok_or_else(|| Error::state(self.pin, "read", state))?;
        Ok(value.read()?)
    }

    fn write_value(&self, value: LineValue) -> Result<()> {
        let inner = self.inner.borrow();
        inner.lifecycle.ensure_ready("write")?;
        let file = inner
            .value
            .as_ref()
            .ok_or_else(|| Error::state(self.pin, "write", inner.lifecycle.state()))?;
        Ok(file.write(value)?)
    }

    fn read_attr(&self, op: &'static str, path: &Path) -> Result<String> {
        self.ensure_exported(op)?;
        Ok(sysfs::read_attr(path)?)
    }

    fn write_attr(&self, attribute: &str, path: &Path, value: &str) -> Result<()> {
        sysfs::write_attr(path, value).map_err(|e| Error::from_write(e, attribute))
    }

    fn write_direction(&self, direction: Direction) -> Result<()> {
        self.write_attr("direction", &self.paths.direction(), direction.as_sysfs())
    }

    fn write_edge(&self, edge: Edge) -> Result<()> {
        self.write_attr("edge", &self.paths.edge(), edge.as_sysfs())
    }

    fn write_active_low(&self, invert: bool) -> Result<()> {
        self.write_attr(
            "active_low",
            &self.paths.active_low(),
            active_low_token(invert),
        )
    }
}

/// Rolls an unfinished init back to `Uninitialized`
struct PendingInit<'a> {
    shared: &'a Shared,
    done: bool,
}

impl Drop for PendingInit<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.shared.inner.borrow_mut().lifecycle.abort_init();
        }
    }
}

const fn active_low_token(invert: bool) -> &'static str {
    if invert {
        "1"
    } else {
        "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::ManualInterrupts;
    use crate::ErrorKind;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::io;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::task::LocalSet;

    /// A fake `/sys/class/gpio` with `pin` already exported
    fn fake_sysfs(pin: u32, value: &str) -> TempDir {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("export"), "").unwrap();
        fs::write(root.path().join("unexport"), "").unwrap();
        let dir = root.path().join(format!("gpio{pin}"));
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("value"), value).unwrap();
        fs::write(dir.join("direction"), "in\n").unwrap();
        fs::write(dir.join("edge"), "none\n").unwrap();
        fs::write(dir.join("active_low"), "0\n").unwrap();
        root
    }

    fn line(root: &TempDir, interrupts: &ManualInterrupts, pin: u32, config: LineConfig) -> Line {
        Line::with_interrupts(Sysfs::new(root.path()), interrupts.clone(), pin, config).unwrap()
    }

    fn set_value(root: &TempDir, pin: u32, value: &str) {
        fs::write(root.path().join(format!("gpio{pin}/value")), value).unwrap();
    }

    /// Let the local watch task catch up
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn construction_exports_missing_pin() {
        let root = fake_sysfs(4, "0\n");

        let line = Line::with_sysfs(Sysfs::new(root.path()), 5, LineConfig::input()).unwrap();
        assert_eq!(line.state(), LineState::Uninitialized);
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "5");

        Line::with_sysfs(Sysfs::new(root.path()), 4, LineConfig::input()).unwrap();
        // already exported, export untouched
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "5");
    }

    #[tokio::test]
    async fn init_applies_configuration_once() {
        let root = fake_sysfs(17, "0\n");
        let config = LineConfig::output()
            .with_edge(Edge::Rising)
            .with_active_low(true);

        let line = Line::with_sysfs(Sysfs::new(root.path()), 17, config).unwrap();
        line.init().await.unwrap();
        assert_eq!(line.state(), LineState::Ready);
        assert_eq!(line.direction().unwrap(), Direction::Out);
        assert_eq!(line.edge().unwrap(), Edge::Rising);
        assert!(line.active_low().unwrap());
        assert!(line.config_report().is_clean());

        // a second init must not rewrite anything
        fs::write(root.path().join("gpio17/direction"), "in").unwrap();
        line.init().await.unwrap();
        assert_eq!(line.direction().unwrap(), Direction::In);
        assert_eq!(line.state(), LineState::Ready);
    }

    #[tokio::test]
    async fn initial_level_is_written_as_high_or_low() {
        let root = fake_sysfs(3, "0\n");
        let config = LineConfig::new(Direction::OutHigh);

        let line = Line::with_sysfs(Sysfs::new(root.path()), 3, config).unwrap();
        line.init().await.unwrap();
        assert_eq!(
            fs::read_to_string(root.path().join("gpio3/direction")).unwrap(),
            "high"
        );
        assert_eq!(line.direction().unwrap(), Direction::OutHigh);
    }

    #[tokio::test]
    async fn previously_exported_line_keeps_direction_when_asked() {
        let root = fake_sysfs(6, "0\n");
        let config = LineConfig::output().with_reconfigure_direction(false);

        let line = Line::with_sysfs(Sysfs::new(root.path()), 6, config).unwrap();
        line.init().await.unwrap();
        assert_eq!(line.direction().unwrap(), Direction::In);
        assert!(!line.options().reconfigure_direction);
    }

    #[tokio::test]
    async fn rejected_attribute_writes_are_reported_not_fatal() {
        let root = fake_sysfs(8, "1\n");
        // make `edge` unwritable: a directory cannot be opened for writing
        let edge = root.path().join("gpio8/edge");
        fs::remove_file(&edge).unwrap();
        fs::create_dir(&edge).unwrap();

        let config = LineConfig::input().with_edge(Edge::Both);
        let line = Line::with_sysfs(Sysfs::new(root.path()), 8, config).unwrap();
        line.init().await.unwrap();

        let report = line.config_report();
        assert_eq!(report.skipped().len(), 1);
        assert_eq!(report.skipped()[0].attribute, "edge");
        assert_eq!(report.skipped()[0].value, "both");
        assert_eq!(line.read_sync().unwrap(), LineValue::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_handshake_leaves_line_uninitialized() {
        let root = fake_sysfs(2, "0\n");
        fs::remove_file(root.path().join("gpio2/direction")).unwrap();
        let config = LineConfig::input().with_handshake(RetryPolicy::new(
            2,
            Duration::from_millis(1),
            Duration::from_millis(1),
        ));

        let line = Line::with_sysfs(Sysfs::new(root.path()), 2, config).unwrap();
        let err = line.init().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::HandshakeTimeout { .. }));
        assert_eq!(line.state(), LineState::Uninitialized);

        fs::write(root.path().join("gpio2/direction"), "in").unwrap();
        line.init().await.unwrap();
        assert_eq!(line.state(), LineState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_init_can_be_retried() {
        let root = fake_sysfs(9, "0\n");
        fs::remove_file(root.path().join("gpio9/value")).unwrap();
        let line = Line::with_sysfs(Sysfs::new(root.path()), 9, LineConfig::input()).unwrap();

        let res = tokio::time::timeout(Duration::from_millis(5), line.init()).await;
        assert!(res.is_err());
        assert_eq!(line.state(), LineState::Uninitialized);

        set_value(&root, 9, "1\n");
        line.init().await.unwrap();
        assert_eq!(line.read_sync().unwrap(), LineValue::Active);
    }

    #[tokio::test]
    async fn io_requires_ready_line() {
        let root = fake_sysfs(5, "0\n");
        let line = Line::with_sysfs(Sysfs::new(root.path()), 5, LineConfig::output()).unwrap();

        let err = line.read_sync().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::State {
                state: LineState::Uninitialized,
                ..
            }
        ));
        assert!(line.write_sync(true).is_err());
        assert!(line.watch(&Watcher::new(|_| {})).is_err());
    }

    #[tokio::test]
    async fn spawned_read_and_write_run_in_order() {
        let root = fake_sysfs(7, "0\n");
        let line = Line::with_sysfs(Sysfs::new(root.path()), 7, LineConfig::output()).unwrap();
        line.init().await.unwrap();

        LocalSet::new()
            .run_until(async {
                // not awaited: the write still happens before the read
                let write = line.write(1u8);
                let read = line.read();
                assert_eq!(read.await.unwrap().unwrap(), LineValue::Active);
                assert!(write.is_finished());
            })
            .await;
    }

    #[tokio::test]
    async fn spawned_read_after_unexport_reports_state_error() {
        let root = fake_sysfs(7, "0\n");
        let line = Line::with_sysfs(Sysfs::new(root.path()), 7, LineConfig::input()).unwrap();
        line.init().await.unwrap();

        LocalSet::new()
            .run_until(async {
                let read = line.read();
                line.unexport().unwrap();
                let err = read.await.unwrap().unwrap_err();
                assert!(matches!(err.kind(), ErrorKind::State { .. }));
            })
            .await;
    }

    #[tokio::test]
    async fn watch_arms_and_disarms() {
        let root = fake_sysfs(11, "0\n");
        let interrupts = ManualInterrupts::new();
        let line = line(&root, &interrupts, 11, LineConfig::input().with_edge(Edge::Both));
        line.init().await.unwrap();

        LocalSet::new()
            .run_until(async {
                assert!(!line.is_watched());
                let a = Watcher::new(|_| {});
                let b = Watcher::new(|_| {});
                line.watch(&a).unwrap();
                line.watch(&b).unwrap();
                line.watch(&a).unwrap();
                assert!(line.is_watched());
                assert_eq!(interrupts.subscribers(), 1);
                assert_eq!(line.watcher_count(), 3);

                line.unwatch(&a);
                assert_eq!(line.watcher_count(), 1);
                settle().await;
                assert_eq!(interrupts.subscribers(), 1);

                line.unwatch(&b);
                assert!(!line.is_watched());
                settle().await;
                assert_eq!(interrupts.subscribers(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn duplicate_watchers_are_called_per_registration() {
        let root = fake_sysfs(12, "1\n");
        let interrupts = ManualInterrupts::new();
        let line = line(&root, &interrupts, 12, LineConfig::input().with_edge(Edge::Both));
        line.init().await.unwrap();

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let w = Watcher::new(move |res| {
            assert_eq!(res.unwrap(), LineValue::Active);
            h.set(h.get() + 1);
        });

        LocalSet::new()
            .run_until(async {
                line.watch(&w).unwrap();
                line.watch(&w).unwrap();
                interrupts.trigger();
                settle().await;
            })
            .await;
        assert_eq!(hits.get(), 2);
    }

    #[tokio::test]
    async fn software_edge_filter() {
        let root = fake_sysfs(13, "0\n");
        let interrupts = ManualInterrupts::new();
        let line = line(&root, &interrupts, 13, LineConfig::input().with_edge(Edge::Rising));
        line.init().await.unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        LocalSet::new()
            .run_until(async {
                line.watch(&Watcher::new(move |res| s.borrow_mut().push(res.unwrap())))
                    .unwrap();

                interrupts.trigger();
                settle().await;
                set_value(&root, 13, "1\n");
                interrupts.trigger();
                settle().await;
                assert_eq!(*seen.borrow(), vec![LineValue::Active]);

                line.set_edge(Edge::Falling).unwrap();
                set_value(&root, 13, "0\n");
                interrupts.trigger();
                settle().await;
            })
            .await;
        assert_eq!(*seen.borrow(), vec![LineValue::Active, LineValue::Inactive]);
    }

    #[tokio::test]
    async fn notifier_errors_reach_every_watcher_and_disarm() {
        let root = fake_sysfs(14, "0\n");
        let interrupts = ManualInterrupts::new();
        let line = line(&root, &interrupts, 14, LineConfig::input().with_edge(Edge::Both));
        line.init().await.unwrap();

        let errors = Rc::new(Cell::new(0));
        LocalSet::new()
            .run_until(async {
                for _ in 0..3 {
                    let e = errors.clone();
                    line.watch(&Watcher::new(move |res| {
                        let err = res.unwrap_err();
                        assert!(matches!(
                            err.kind(),
                            ErrorKind::Notify(source) if source.kind() == io::ErrorKind::BrokenPipe
                        ));
                        e.set(e.get() + 1);
                    }))
                    .unwrap();
                }

                interrupts.fail_next(io::ErrorKind::BrokenPipe);
                settle().await;
                assert_eq!(errors.get(), 3);
                // back to idle, not retried
                assert!(!line.is_watched());
                assert_eq!(line.watcher_count(), 0);
                assert_eq!(interrupts.subscribers(), 0);

                // watching again arms a fresh registration
                let hits = Rc::new(Cell::new(0));
                let h = hits.clone();
                line.watch(&Watcher::new(move |res| {
                    res.unwrap();
                    h.set(h.get() + 1);
                }))
                .unwrap();
                assert_eq!(interrupts.subscribers(), 1);
                interrupts.trigger();
                settle().await;
                assert_eq!(hits.get(), 1);
            })
            .await;
        assert_eq!(errors.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn edge_latched_while_debouncing_is_discarded() {
        let root = fake_sysfs(15, "0\n");
        let interrupts = ManualInterrupts::new();
        let config = LineConfig::input()
            .with_edge(Edge::Both)
            .with_debounce_ms(50);
        let line = line(&root, &interrupts, 15, config);
        line.init().await.unwrap();

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        LocalSet::new()
            .run_until(async {
                line.watch(&Watcher::new(move |_| h.set(h.get() + 1)))
                    .unwrap();

                interrupts.trigger();
                settle().await;
                assert_eq!(hits.get(), 1);

                tokio::time::sleep(Duration::from_millis(10)).await;
                interrupts.trigger();
                settle().await;
                assert_eq!(interrupts.pending(), 1);

                tokio::time::sleep(Duration::from_millis(50)).await;
                settle().await;
                assert_eq!(hits.get(), 1);
                assert_eq!(interrupts.pending(), 0);
                assert!(line.is_watched());

                interrupts.trigger();
                settle().await;
                assert_eq!(hits.get(), 2);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_rearm_read_disarms_and_returns_to_idle() {
        let root = fake_sysfs(16, "1\n");
        let interrupts = ManualInterrupts::new();
        let config = LineConfig::input()
            .with_edge(Edge::Both)
            .with_debounce_ms(20);
        let line = line(&root, &interrupts, 16, config);
        line.init().await.unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let watcher = Watcher::new(move |res| {
            s.borrow_mut().push(res.map_err(|e| e.to_string()))
        });

        LocalSet::new()
            .run_until(async {
                line.watch(&watcher).unwrap();
                interrupts.trigger();
                settle().await;

                // the read before re-arming sees an empty attribute
                set_value(&root, 16, "");
                tokio::time::sleep(Duration::from_millis(25)).await;
                settle().await;

                assert!(!line.is_watched());
                assert_eq!(line.watcher_count(), 0);
                assert_eq!(interrupts.subscribers(), 0);

                set_value(&root, 16, "0\n");
                line.watch(&watcher).unwrap();
                interrupts.trigger();
                settle().await;
            })
            .await;

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], Ok(LineValue::Active));
        assert!(seen[1].as_ref().is_err_and(|e| e.contains("empty")));
        assert_eq!(seen[2], Ok(LineValue::Inactive));
    }

    #[tokio::test]
    async fn unexport_tears_everything_down_once() {
        let root = fake_sysfs(21, "0\n");
        let interrupts = ManualInterrupts::new();
        let line = line(&root, &interrupts, 21, LineConfig::input().with_edge(Edge::Both));
        line.init().await.unwrap();

        LocalSet::new()
            .run_until(async {
                line.watch(&Watcher::new(|_| panic!("no edges after unexport")))
                    .unwrap();

                line.unexport().unwrap();
                interrupts.trigger();
                settle().await;
                assert_eq!(interrupts.subscribers(), 0);
            })
            .await;

        assert_eq!(line.state(), LineState::Unexported);
        assert_eq!(line.watcher_count(), 0);
        assert_eq!(
            fs::read_to_string(root.path().join("unexport")).unwrap(),
            "21"
        );

        let err = line.unexport().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::State {
                op: "unexport",
                ..
            }
        ));
        assert!(line.read_sync().is_err());
        assert!(line.direction().is_err());
        assert!(line.init().await.is_err());
    }

    #[tokio::test]
    async fn refused_kernel_unexport_is_tolerated() {
        let root = fake_sysfs(22, "0\n");
        fs::remove_file(root.path().join("unexport")).unwrap();
        let line = Line::with_sysfs(Sysfs::new(root.path()), 22, LineConfig::input()).unwrap();
        line.init().await.unwrap();

        line.unexport().unwrap();
        assert_eq!(line.state(), LineState::Unexported);
    }

    #[tokio::test]
    async fn dropping_a_watched_line_ends_its_task() {
        let root = fake_sysfs(23, "0\n");
        let interrupts = ManualInterrupts::new();
        let line = line(&root, &interrupts, 23, LineConfig::input().with_edge(Edge::Both));
        line.init().await.unwrap();

        let local = LocalSet::new();
        local
            .run_until(async {
                line.watch(&Watcher::new(|_| {})).unwrap();
                assert_eq!(interrupts.subscribers(), 1);

                drop(line);
                settle().await;
            })
            .await;
        assert_eq!(interrupts.subscribers(), 0);
        // nothing left to drive
        local.await;
    }

    #[tokio::test]
    async fn unexpected_attribute_text_is_invalid_argument() {
        let root = fake_sysfs(24, "0\n");
        fs::write(root.path().join("gpio24/active_low"), "maybe").unwrap();
        let line = Line::with_sysfs(Sysfs::new(root.path()), 24, LineConfig::input()).unwrap();

        let err = line.active_low().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
    }
}
