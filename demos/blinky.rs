// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;
use std::time::Duration;

use gpio_sysfs::{Direction, Line, LineConfig, LineValue, Sysfs};
use quicli::prelude::CliResult;
use structopt::StructOpt;
use tokio::task::LocalSet;
use tokio::time::{interval, timeout};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, StructOpt)]
struct Cli {
    /// The GPIO number of the line
    pin: u32,
    /// Period in milliseconds
    period_ms: u64,
    /// Duration over which to blink in milliseconds
    duration_ms: u64,
    /// Root of the sysfs GPIO tree
    #[structopt(long, default_value = "/sys/class/gpio", parse(from_os_str))]
    sysfs: PathBuf,
    /// Leave the line exported when done
    #[structopt(long)]
    keep: bool,
}

/// Toggle the line every `period` until cancelled
async fn blink(line: &Line, period: Duration) -> anyhow::Result<()> {
    let mut ticks = interval(period);
    let mut value = LineValue::Active;
    loop {
        ticks.tick().await;
        line.write(value).await??;
        value = LineValue::new(!value.is_active());
    }
}

async fn do_main(args: Cli) -> anyhow::Result<()> {
    // start low so the first toggle is a visible edge
    let config = LineConfig::new(Direction::OutLow);
    let line = Line::with_sysfs(Sysfs::new(args.sysfs), args.pin, config)?;
    line.init().await?;

    let period = Duration::from_millis(args.period_ms);
    let duration = Duration::from_millis(args.duration_ms);
    if let Ok(res) = timeout(duration, blink(&line, period)).await {
        res?;
    }

    if !args.keep {
        line.unexport()?;
    }
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
