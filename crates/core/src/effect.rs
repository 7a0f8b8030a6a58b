// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects requested by the application state machine

use crate::id::{ApplicationId, ContainerId};
use serde::{Deserialize, Serialize};

/// Side effects for external collaborators to carry out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Localize the application's resources on this node
    InitializeResources {
        application: ApplicationId,
        user: String,
    },
    /// Start a container whose launch was deferred or just requested
    LaunchContainer { container: ContainerId },
    /// Stop a container
    KillContainer { container: ContainerId },
    /// Emit a lifecycle notification
    Emit(NodeEvent),
}

impl Effect {
    /// The application this effect concerns
    pub fn application(&self) -> ApplicationId {
        match self {
            Effect::InitializeResources { application, .. } => *application,
            Effect::LaunchContainer { container } | Effect::KillContainer { container } => {
                container.application_id()
            }
            Effect::Emit(event) => event.application(),
        }
    }
}

/// Notifications consumed by the application lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEvent {
    /// Every known container finished and no more will be launched
    ApplicationFinished { application: ApplicationId },
    /// The application hit an unrecoverable error
    ApplicationFailed {
        application: ApplicationId,
        reason: String,
    },
}

impl NodeEvent {
    pub fn application(&self) -> ApplicationId {
        match self {
            NodeEvent::ApplicationFinished { application }
            | NodeEvent::ApplicationFailed { application, .. } => *application,
        }
    }
}
