// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! nm-core: application lifecycle core of the node manager
//!
//! This crate provides:
//! - Identifiers for applications, attempts and containers
//! - The immutable application event type
//! - The per-application container registry
//! - The pure application state machine and the effects it requests

pub mod id;

// State machine (order matters for dependencies)
pub mod event;
pub mod effect;
pub mod registry;
pub mod application;

// Re-exports
pub use application::{Application, ApplicationSnapshot, ApplicationState};
pub use effect::{Effect, NodeEvent};
pub use event::{ApplicationEvent, ApplicationEventPayload, ApplicationEventType};
pub use id::{ApplicationId, AttemptId, ContainerId, ParseIdError};
pub use registry::{ContainerRegistry, ContainerStatus, Registration};
