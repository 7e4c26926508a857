// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Print every (debounced) press and release of a push button.

use std::path::PathBuf;
use std::time::Duration;

use gpio_sysfs::{Edge, Line, LineConfig, Sysfs, Watcher};
use quicli::prelude::CliResult;
use structopt::StructOpt;
use tokio::task::LocalSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, StructOpt)]
struct Cli {
    /// The GPIO number of the button
    pin: u32,
    /// Edge to report: none, rising, falling or both
    #[structopt(short, long, default_value = "both")]
    edge: Edge,
    /// Debounce period in milliseconds, 0 disables debouncing
    #[structopt(short, long, default_value = "20")]
    debounce_ms: u64,
    /// The button pulls the line low when pressed
    #[structopt(long)]
    active_low: bool,
    /// Stop after this many seconds instead of running until interrupted
    #[structopt(short, long)]
    timeout: Option<u64>,
    /// Root of the sysfs GPIO tree
    #[structopt(long, default_value = "/sys/class/gpio", parse(from_os_str))]
    sysfs: PathBuf,
}

async fn do_main(args: Cli) -> anyhow::Result<()> {
    let sysfs = Sysfs::new(args.sysfs);
    if !sysfs.is_accessible() {
        anyhow::bail!("{} is not writable", sysfs.root().join("export").display());
    }

    let config = LineConfig::input()
        .with_edge(args.edge)
        .with_active_low(args.active_low)
        .with_debounce_ms(args.debounce_ms);
    let button = Line::with_sysfs(sysfs, args.pin, config)?;
    button.init().await?;

    for skipped in button.config_report().skipped() {
        tracing::warn!(
            "could not set {} to {}: {}",
            skipped.attribute,
            skipped.value,
            skipped.error
        );
    }
    println!("gpio{} = {}", button.pin(), button.read_sync()?);

    let pin = button.pin();
    button.watch(&Watcher::new(move |value| match value {
        Ok(value) if value.is_active() => println!("gpio{}: pressed", pin),
        Ok(_) => println!("gpio{}: released", pin),
        Err(e) => tracing::error!("gpio{}: {}", pin, e),
    }))?;

    match args.timeout {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await?,
    }

    button.unexport()?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> CliResult {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Cli::from_args();
    let local = LocalSet::new();
    if let Err(e) = local.run_until(do_main(args)).await {
        tracing::error!("{:?}", e);
    }
    Ok(())
}
