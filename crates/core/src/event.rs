// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application events
//!
//! Every event targets exactly one application, which is the key the
//! dispatcher routes on. Container events derive their target from the
//! container id, so the two can never disagree.

use crate::id::{ApplicationId, ContainerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator for [`ApplicationEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationEventType {
    Init,
    Initialized,
    ContainerLaunched,
    ContainerFinished,
    NoMoreContainers,
    FinishRequest,
    Fail,
}

impl ApplicationEventType {
    pub fn name(&self) -> &'static str {
        match self {
            ApplicationEventType::Init => "init",
            ApplicationEventType::Initialized => "initialized",
            ApplicationEventType::ContainerLaunched => "container_launched",
            ApplicationEventType::ContainerFinished => "container_finished",
            ApplicationEventType::NoMoreContainers => "no_more_containers",
            ApplicationEventType::FinishRequest => "finish_request",
            ApplicationEventType::Fail => "fail",
        }
    }
}

impl fmt::Display for ApplicationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload carried by an [`ApplicationEvent`], one variant per event type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationEventPayload {
    /// Application accepted on this node
    Init { user: String },
    /// Application resources are ready on the node
    Initialized,
    /// A container of the application was started
    ContainerLaunched { container: ContainerId },
    /// A container of the application exited
    ContainerFinished { container: ContainerId },
    /// No further containers will be launched for the application
    NoMoreContainers,
    /// The application finished cluster-wide; remaining containers must go
    FinishRequest,
    /// Unrecoverable error reported by a collaborator
    Fail { reason: String },
}

impl ApplicationEventPayload {
    pub fn event_type(&self) -> ApplicationEventType {
        match self {
            ApplicationEventPayload::Init { .. } => ApplicationEventType::Init,
            ApplicationEventPayload::Initialized => ApplicationEventType::Initialized,
            ApplicationEventPayload::ContainerLaunched { .. } => {
                ApplicationEventType::ContainerLaunched
            }
            ApplicationEventPayload::ContainerFinished { .. } => {
                ApplicationEventType::ContainerFinished
            }
            ApplicationEventPayload::NoMoreContainers => ApplicationEventType::NoMoreContainers,
            ApplicationEventPayload::FinishRequest => ApplicationEventType::FinishRequest,
            ApplicationEventPayload::Fail { .. } => ApplicationEventType::Fail,
        }
    }
}

/// Immutable event addressed to one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEvent {
    target: ApplicationId,
    payload: ApplicationEventPayload,
}

impl ApplicationEvent {
    /// Build an event from raw parts.
    ///
    /// The target is not checked against a container payload here; the
    /// state machine treats a mismatch as an inconsistency.
    pub fn new(target: ApplicationId, payload: ApplicationEventPayload) -> Self {
        Self { target, payload }
    }

    pub fn init(application: ApplicationId, user: impl Into<String>) -> Self {
        Self::new(application, ApplicationEventPayload::Init { user: user.into() })
    }

    pub fn initialized(application: ApplicationId) -> Self {
        Self::new(application, ApplicationEventPayload::Initialized)
    }

    pub fn container_launched(container: ContainerId) -> Self {
        Self::new(
            container.application_id(),
            ApplicationEventPayload::ContainerLaunched { container },
        )
    }

    pub fn container_finished(container: ContainerId) -> Self {
        Self::new(
            container.application_id(),
            ApplicationEventPayload::ContainerFinished { container },
        )
    }

    pub fn no_more_containers(application: ApplicationId) -> Self {
        Self::new(application, ApplicationEventPayload::NoMoreContainers)
    }

    pub fn finish_request(application: ApplicationId) -> Self {
        Self::new(application, ApplicationEventPayload::FinishRequest)
    }

    pub fn fail(application: ApplicationId, reason: impl Into<String>) -> Self {
        Self::new(
            application,
            ApplicationEventPayload::Fail {
                reason: reason.into(),
            },
        )
    }

    /// Routing key
    pub fn target(&self) -> &ApplicationId {
        &self.target
    }

    pub fn event_type(&self) -> ApplicationEventType {
        self.payload.event_type()
    }

    pub fn payload(&self) -> &ApplicationEventPayload {
        &self.payload
    }

    /// Container carried by container lifecycle events
    pub fn container_id(&self) -> Option<&ContainerId> {
        match &self.payload {
            ApplicationEventPayload::ContainerLaunched { container }
            | ApplicationEventPayload::ContainerFinished { container } => Some(container),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
