// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The `gpio-sysfs` crate drives a single GPIO line through the legacy
//! [sysfs interface](https://www.kernel.org/doc/Documentation/gpio/sysfs.txt)
//! under `/sys/class/gpio`.
//!
//! The character device ABI supersedes sysfs, but plenty of boards, vendor
//! kernels and udev setups still only expose the sysfs tree. This crate
//! takes care of the awkward parts of it: waiting for an exported line to
//! actually show up, turning edge interrupts into callbacks, and
//! debouncing noisy inputs.
//!
//! The asynchronous parts (the export handshake, interrupt watches and
//! their debounce timers) run on tokio. A [`Line`] is not `Send`: use a
//! current-thread runtime and a [`LocalSet`](tokio::task::LocalSet), so
//! every callback runs on the one thread that owns the line.
//!
//! # Examples
//!
//! Mirror a button on GPIO 4 to an LED on GPIO 17:
//!
//! ```no_run
//! use std::rc::Rc;
//! use gpio_sysfs::{Edge, Line, LineConfig, Watcher};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), gpio_sysfs::Error> {
//!     let local = tokio::task::LocalSet::new();
//!     local
//!         .run_until(async {
//!             let led = Rc::new(Line::new(17, LineConfig::output())?);
//!             led.init().await?;
//!
//!             let button = Line::new(
//!                 4,
//!                 LineConfig::input().with_edge(Edge::Both).with_debounce_ms(20),
//!             )?;
//!             button.init().await?;
//!
//!             let mirror = led.clone();
//!             button.watch(&Watcher::new(move |value| match value {
//!                 Ok(value) => {
//!                     if let Err(e) = mirror.write_sync(value) {
//!                         eprintln!("{}", e);
//!                     }
//!                 }
//!                 Err(e) => eprintln!("{}", e),
//!             }))?;
//!
//!             std::future::pending::<()>().await;
//!             Ok::<_, gpio_sysfs::Error>(())
//!         })
//!         .await
//! }
//! ```
//!
//! Synchronous access needs nothing but an initialized line:
//!
//! ```no_run
//! use gpio_sysfs::{Line, LineConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), gpio_sysfs::Error> {
//! let line = Line::new(4, LineConfig::input())?;
//! line.init().await?;
//! println!("gpio4 = {}", line.read_sync()?);
//! line.unexport()?;
//! # Ok(()) }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod errors;
pub mod interrupt;
pub mod line;
pub mod sysfs;

pub use errors::{Error, ErrorKind, HandshakeStage, Result};
pub use interrupt::{Interrupts, KernelInterrupts, ManualInterrupts};
pub use line::{
    ConfigReport, Direction, Edge, Line, LineConfig, LineOptions, LineState, LineValue,
    RetryPolicy, WatchResult, Watcher,
};
pub use sysfs::Sysfs;
