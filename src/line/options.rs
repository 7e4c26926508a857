// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::str::FromStr;
use std::time::Duration;

use super::handshake::RetryPolicy;
use super::LineValue;
use crate::errors::{Error, Result};

/// Direction requested for a line.
///
/// `OutHigh` and `OutLow` configure an output and set its initial value in
/// a single write, avoiding a glitch between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    OutHigh,
    OutLow,
}

impl Direction {
    /// Token written to the `direction` attribute
    pub const fn as_sysfs(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::OutHigh => "high",
            Direction::OutLow => "low",
        }
    }

    pub const fn is_output(&self) -> bool {
        !matches!(self, Direction::In)
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            "high" | "out-initial-high" => Ok(Direction::OutHigh),
            "low" | "out-initial-low" => Ok(Direction::OutLow),
            other => Err(Error::invalid_argument(format!(
                "unknown direction {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sysfs())
    }
}

/// Signal edge that raises an interrupt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Edge {
    #[default]
    None,
    Rising,
    Falling,
    Both,
}

impl Edge {
    /// Token written to the `edge` attribute
    pub const fn as_sysfs(&self) -> &'static str {
        match self {
            Edge::None => "none",
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        }
    }

    /// Whether a notification reading `value` belongs to this edge.
    ///
    /// A rising edge leaves the line active and a falling edge leaves it
    /// inactive; `None` and `Both` accept everything the kernel reports.
    pub const fn accepts(&self, value: LineValue) -> bool {
        match self {
            Edge::Rising => value.is_active(),
            Edge::Falling => !value.is_active(),
            Edge::None | Edge::Both => true,
        }
    }
}

impl FromStr for Edge {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Edge::None),
            "rising" => Ok(Edge::Rising),
            "falling" => Ok(Edge::Falling),
            "both" => Ok(Edge::Both),
            other => Err(Error::invalid_argument(format!("unknown edge {other:?}"))),
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sysfs())
    }
}

/// Everything needed to claim and configure a line.
///
/// ```
/// use std::time::Duration;
/// use gpio_sysfs::line::options::{Edge, LineConfig};
///
/// let button = LineConfig::input()
///     .with_edge(Edge::Both)
///     .with_debounce(Duration::from_millis(10));
/// assert!(button.debounce_enabled());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    pub direction: Direction,
    pub edge: Option<Edge>,
    pub active_low: bool,
    /// Zero disables debouncing
    pub debounce: Duration,
    /// Rewrite `direction` during init even if the line was already exported
    pub reconfigure_direction: bool,
    pub handshake: RetryPolicy,
}

impl LineConfig {
    pub const fn new(direction: Direction) -> Self {
        Self {
            direction,
            edge: None,
            active_low: false,
            debounce: Duration::ZERO,
            reconfigure_direction: true,
            handshake: RetryPolicy::DEFAULT,
        }
    }

    pub const fn input() -> Self {
        Self::new(Direction::In)
    }

    pub const fn output() -> Self {
        Self::new(Direction::Out)
    }

    pub const fn with_edge(self, edge: Edge) -> Self {
        Self {
            edge: Some(edge),
            ..self
        }
    }

    pub const fn with_active_low(self, active_low: bool) -> Self {
        Self { active_low, ..self }
    }

    pub const fn with_debounce(self, debounce: Duration) -> Self {
        Self { debounce, ..self }
    }

    pub const fn with_debounce_ms(self, millis: u64) -> Self {
        self.with_debounce(Duration::from_millis(millis))
    }

    pub const fn with_reconfigure_direction(self, reconfigure_direction: bool) -> Self {
        Self {
            reconfigure_direction,
            ..self
        }
    }

    pub const fn with_handshake(self, handshake: RetryPolicy) -> Self {
        Self { handshake, ..self }
    }

    pub const fn debounce_enabled(&self) -> bool {
        !self.debounce.is_zero()
    }

    pub const fn options(&self) -> LineOptions {
        LineOptions {
            debounce: self.debounce,
            active_low: self.active_low,
            reconfigure_direction: self.reconfigure_direction,
        }
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::input()
    }
}

/// Options a line was constructed with, as reported by [`Line::options`](super::Line::options)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOptions {
    pub debounce: Duration,
    pub active_low: bool,
    pub reconfigure_direction: bool,
}
