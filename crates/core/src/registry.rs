// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container registry
//!
//! Tracks the containers of a single application. Only the owning
//! [`Application`](crate::application::Application) touches it, so it
//! carries no synchronization.

use crate::id::ContainerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of a container known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Running,
    Finished,
}

/// Outcome of [`ContainerRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Newly registered as running
    Added,
    /// Already registered and still running
    AlreadyRunning,
    /// The id already finished; it cannot run again
    AlreadyFinished,
}

/// Map of container id to status, with a count of running entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRegistry {
    containers: BTreeMap<ContainerId, ContainerStatus>,
    running: usize,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a launched container as running
    pub fn register(&mut self, id: ContainerId) -> Registration {
        match self.containers.get(&id) {
            Some(ContainerStatus::Running) => Registration::AlreadyRunning,
            Some(ContainerStatus::Finished) => Registration::AlreadyFinished,
            None => {
                self.containers.insert(id, ContainerStatus::Running);
                self.running += 1;
                Registration::Added
            }
        }
    }

    /// Mark a container finished.
    ///
    /// Returns true only if this call moved it from running to finished.
    pub fn mark_finished(&mut self, id: &ContainerId) -> bool {
        match self.containers.get_mut(id) {
            Some(status @ ContainerStatus::Running) => {
                *status = ContainerStatus::Finished;
                self.running -= 1;
                true
            }
            _ => false,
        }
    }

    /// True if any container is still running
    pub fn has_outstanding(&self) -> bool {
        self.running > 0
    }

    pub fn status(&self, id: &ContainerId) -> Option<ContainerStatus> {
        self.containers.get(id).copied()
    }

    /// Running containers in id order
    pub fn running(&self) -> impl Iterator<Item = &ContainerId> {
        self.containers
            .iter()
            .filter(|(_, status)| **status == ContainerStatus::Running)
            .map(|(id, _)| id)
    }

    /// All containers with their status, in id order
    pub fn iter(&self) -> impl Iterator<Item = (&ContainerId, ContainerStatus)> {
        self.containers.iter().map(|(id, status)| (id, *status))
    }

    pub fn running_count(&self) -> usize {
        self.running
    }

    pub fn finished_count(&self) -> usize {
        self.containers.len() - self.running
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
