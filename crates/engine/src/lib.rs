// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Node manager event dispatch engine

mod dispatcher;
mod error;
mod handler;

pub use dispatcher::{Dispatcher, EffectReceiver, EffectSender};
pub use error::DispatchError;
pub use handler::EventHandler;
