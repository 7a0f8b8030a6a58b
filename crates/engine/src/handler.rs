// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler seam between the dispatcher and the state it drives

use nm_core::{Application, ApplicationEvent, ApplicationSnapshot, Effect};

/// Per-key event consumer owned by exactly one dispatcher actor
pub trait EventHandler: Send + 'static {
    /// Point-in-time view returned by [`Dispatcher::snapshot`](crate::Dispatcher::snapshot)
    type Snapshot: Send + 'static;

    /// Consume one event, returning the effects it produced in order
    fn handle(&mut self, event: ApplicationEvent) -> Vec<Effect>;

    /// Once true the actor retires and discards anything still queued
    fn is_terminal(&self) -> bool;

    fn snapshot(&self) -> Self::Snapshot;
}

impl EventHandler for Application {
    type Snapshot = ApplicationSnapshot;

    fn handle(&mut self, event: ApplicationEvent) -> Vec<Effect> {
        let (next, effects) = self.transition(&event);
        *self = next;
        effects
    }

    fn is_terminal(&self) -> bool {
        Application::is_terminal(self)
    }

    fn snapshot(&self) -> ApplicationSnapshot {
        Application::snapshot(self)
    }
}
