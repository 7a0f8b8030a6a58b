// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application state machine
//!
//! One instance per application with containers on this node. It tracks
//! the application's containers and decides when the application has
//! fully finished.
//!
//! ```text
//! New ──Init──► Initializing ──Initialized──► Running ──FinishRequest──► FinishingContainersWait
//!                                               │                               │
//!                                               └──last container finished──────┴──► Finished
//!
//! any non-terminal state ──Fail / inconsistency──► Failed
//! ```

use crate::effect::{Effect, NodeEvent};
use crate::event::{ApplicationEvent, ApplicationEventPayload};
use crate::id::{ApplicationId, ContainerId};
use crate::registry::{ContainerRegistry, ContainerStatus, Registration};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle state of an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    New,
    Initializing,
    Running,
    FinishingContainersWait,
    Finished,
    Failed { reason: String },
}

impl ApplicationState {
    pub fn name(&self) -> &'static str {
        match self {
            ApplicationState::New => "new",
            ApplicationState::Initializing => "initializing",
            ApplicationState::Running => "running",
            ApplicationState::FinishingContainersWait => "finishing_containers_wait",
            ApplicationState::Finished => "finished",
            ApplicationState::Failed { .. } => "failed",
        }
    }

    /// Terminal states absorb every further event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationState::Finished | ApplicationState::Failed { .. }
        )
    }
}

/// An application and the containers it runs on this node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub id: ApplicationId,
    pub user: String,
    pub state: ApplicationState,
    pub containers: ContainerRegistry,
    /// Set once no further containers will be launched
    pub no_more_containers: bool,
    /// Containers registered before resources were ready, in arrival order
    pub pending_launch: Vec<ContainerId>,
    /// Finish notifications for unknown or already finished containers
    pub duplicate_finishes: u64,
}

impl Application {
    /// Create an application in the New state
    pub fn new(id: ApplicationId) -> Self {
        Self {
            id,
            user: String::new(),
            state: ApplicationState::New,
            containers: ContainerRegistry::new(),
            no_more_containers: false,
            pending_launch: Vec::new(),
            duplicate_finishes: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Pure transition function - returns new state and effects
    pub fn transition(&self, event: &ApplicationEvent) -> (Application, Vec<Effect>) {
        if self.is_terminal() {
            tracing::debug!(
                application = %self.id,
                event = %event.event_type(),
                state = self.state.name(),
                "ignoring event for terminal application"
            );
            return (self.clone(), vec![]);
        }

        if event.target() != &self.id {
            return self.fail(format!(
                "{} event for {} delivered to {}",
                event.event_type(),
                event.target(),
                self.id
            ));
        }
        if let Some(container) = event.container_id() {
            if container.application_id() != self.id {
                return self.fail(format!(
                    "container {} does not belong to {}",
                    container, self.id
                ));
            }
        }

        let mut next = self.clone();
        let mut effects = Vec::new();

        match (&self.state, event.payload()) {
            (ApplicationState::New, ApplicationEventPayload::Init { user }) => {
                next.user = user.clone();
                next.state = ApplicationState::Initializing;
                effects.push(Effect::InitializeResources {
                    application: self.id,
                    user: user.clone(),
                });
            }

            (ApplicationState::Initializing, ApplicationEventPayload::Initialized) => {
                next.state = ApplicationState::Running;
                effects.extend(
                    std::mem::take(&mut next.pending_launch)
                        .into_iter()
                        .map(|container| Effect::LaunchContainer { container }),
                );
                next.finish_if_complete(&mut effects);
            }

            (_, ApplicationEventPayload::ContainerLaunched { container }) => {
                if let Err(reason) = next.container_launched(*container, &mut effects) {
                    return self.fail(reason);
                }
            }

            (_, ApplicationEventPayload::ContainerFinished { container }) => {
                next.container_finished(container);
                next.finish_if_complete(&mut effects);
            }

            (_, ApplicationEventPayload::NoMoreContainers) => {
                next.no_more_containers = true;
                next.finish_if_complete(&mut effects);
            }

            (
                ApplicationState::New | ApplicationState::Initializing | ApplicationState::Running,
                ApplicationEventPayload::FinishRequest,
            ) => {
                next.no_more_containers = true;
                // Deferred containers never started; nothing to kill.
                for container in std::mem::take(&mut next.pending_launch) {
                    next.containers.mark_finished(&container);
                }
                if next.containers.has_outstanding() {
                    effects.extend(
                        next.containers
                            .running()
                            .map(|container| Effect::KillContainer {
                                container: *container,
                            }),
                    );
                    next.state = ApplicationState::FinishingContainersWait;
                } else {
                    next.finish(&mut effects);
                }
            }

            (_, ApplicationEventPayload::Fail { reason }) => {
                return self.fail(reason.clone());
            }

            (state, _) => {
                tracing::debug!(
                    application = %self.id,
                    event = %event.event_type(),
                    state = state.name(),
                    "event has no effect in current state"
                );
            }
        }

        if next.state != self.state {
            tracing::info!(
                application = %self.id,
                from = self.state.name(),
                to = next.state.name(),
                event = %event.event_type(),
                "transition"
            );
        }

        (next, effects)
    }

    fn container_launched(
        &mut self,
        container: ContainerId,
        effects: &mut Vec<Effect>,
    ) -> Result<(), String> {
        if self.no_more_containers {
            tracing::warn!(
                application = %self.id,
                container = %container,
                "container launched after no-more-containers; killing it"
            );
            effects.push(Effect::KillContainer { container });
            return Ok(());
        }

        match self.containers.register(container) {
            Registration::Added => {
                if self.state == ApplicationState::Running {
                    effects.push(Effect::LaunchContainer { container });
                } else {
                    self.pending_launch.push(container);
                }
                Ok(())
            }
            Registration::AlreadyRunning => {
                tracing::debug!(
                    application = %self.id,
                    container = %container,
                    "container already registered"
                );
                Ok(())
            }
            Registration::AlreadyFinished => {
                Err(format!("container {} relaunched after it finished", container))
            }
        }
    }

    fn container_finished(&mut self, container: &ContainerId) {
        if self.containers.mark_finished(container) {
            self.pending_launch.retain(|c| c != container);
            tracing::debug!(
                application = %self.id,
                container = %container,
                outstanding = self.containers.running_count(),
                "container finished"
            );
        } else {
            self.duplicate_finishes += 1;
            tracing::warn!(
                application = %self.id,
                container = %container,
                known = self.containers.status(container).is_some(),
                duplicates = self.duplicate_finishes,
                "duplicate container finish"
            );
        }
    }

    /// Move to Finished once every container is done and none will follow
    fn finish_if_complete(&mut self, effects: &mut Vec<Effect>) {
        let settled = matches!(
            self.state,
            ApplicationState::Running | ApplicationState::FinishingContainersWait
        );
        if settled && self.no_more_containers && !self.containers.has_outstanding() {
            self.finish(effects);
        }
    }

    fn finish(&mut self, effects: &mut Vec<Effect>) {
        self.state = ApplicationState::Finished;
        effects.push(Effect::Emit(NodeEvent::ApplicationFinished {
            application: self.id,
        }));
    }

    fn fail(&self, reason: String) -> (Application, Vec<Effect>) {
        tracing::error!(
            application = %self.id,
            from = self.state.name(),
            reason = %reason,
            "application failed"
        );
        // FinishRequest already killed everything still running.
        let mut effects: Vec<Effect> = if self.state == ApplicationState::FinishingContainersWait {
            Vec::new()
        } else {
            self.containers
                .running()
                .filter(|c| !self.pending_launch.contains(*c))
                .map(|container| Effect::KillContainer {
                    container: *container,
                })
                .collect()
        };
        effects.push(Effect::Emit(NodeEvent::ApplicationFailed {
            application: self.id,
            reason: reason.clone(),
        }));

        let app = Application {
            state: ApplicationState::Failed { reason },
            pending_launch: Vec::new(),
            ..self.clone()
        };
        (app, effects)
    }

    pub fn snapshot(&self) -> ApplicationSnapshot {
        ApplicationSnapshot {
            id: self.id,
            user: self.user.clone(),
            state: self.state.clone(),
            containers: self.containers.iter().map(|(id, s)| (*id, s)).collect(),
            no_more_containers: self.no_more_containers,
            duplicate_finishes: self.duplicate_finishes,
        }
    }
}

/// Point-in-time view of an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    pub id: ApplicationId,
    pub user: String,
    pub state: ApplicationState,
    pub containers: BTreeMap<ContainerId, ContainerStatus>,
    pub no_more_containers: bool,
    pub duplicate_finishes: u64,
}

#[cfg(test)]
#[path = "application_tests.rs"]
mod tests;
