// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Node manager daemon: configuration, logging and event replay

pub mod config;
pub mod logging;
pub mod replay;

pub use config::{Config, ConfigError, LogConfig};
pub use logging::{setup_logging, LoggingError};
pub use replay::{replay, write_effects, InboundRecord, ReplayError, ReplayStats};
