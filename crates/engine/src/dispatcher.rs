// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event dispatcher
//!
//! Routes each [`ApplicationEvent`] to the handler registered for its
//! target. Every registered key gets one actor task with an exclusive
//! FIFO mailbox, so events for one application run strictly in dispatch
//! order while different applications run in parallel.
//!
//! ```text
//! producers ──dispatch──► table[key] ──mailbox──► actor(key) ──effects──► EffectReceiver
//! ```
//!
//! The registration table is the only shared structure. Handler state is
//! confined to its actor.

use crate::error::DispatchError;
use crate::handler::EventHandler;
use nm_core::{Application, ApplicationEvent, ApplicationId, Effect};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

/// Sender for outbound effects
pub type EffectSender = mpsc::UnboundedSender<Effect>;
/// Receiver for outbound effects
pub type EffectReceiver = mpsc::UnboundedReceiver<Effect>;

enum Envelope<S> {
    Event(ApplicationEvent),
    Snapshot(oneshot::Sender<S>),
}

struct Mailbox<S> {
    /// Distinguishes successive registrations of the same key
    generation: u64,
    tx: mpsc::UnboundedSender<Envelope<S>>,
    join: JoinHandle<()>,
}

type Table<S> = Arc<RwLock<HashMap<ApplicationId, Mailbox<S>>>>;

/// Routes events to per-application actors
pub struct Dispatcher<H: EventHandler> {
    table: Table<H::Snapshot>,
    effects: EffectSender,
    generations: Arc<AtomicU64>,
}

impl<H: EventHandler> Dispatcher<H> {
    /// Create a dispatcher publishing effects to `effects`
    pub fn new(effects: EffectSender) -> Self {
        Self {
            table: Arc::new(RwLock::new(HashMap::new())),
            effects,
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a dispatcher together with the receiving end of its effects
    pub fn channel() -> (Self, EffectReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Bind `handler` to `key` and start its actor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&self, key: ApplicationId, handler: H) -> Result<(), DispatchError> {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        if table.contains_key(&key) {
            return Err(DispatchError::AlreadyRegistered(key));
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Actor {
            key,
            generation,
            handler,
            mailbox: rx,
            table: Arc::clone(&self.table),
            effects: self.effects.clone(),
        };
        let span = tracing::info_span!("application", id = %key);
        let join = tokio::spawn(actor.run().instrument(span));

        table.insert(
            key,
            Mailbox {
                generation,
                tx,
                join,
            },
        );
        tracing::debug!(application = %key, generation, "registered");
        Ok(())
    }

    /// Enqueue `event` for the handler registered under its target.
    ///
    /// Never blocks. An unknown target is reported and leaves the
    /// dispatcher untouched.
    pub fn dispatch(&self, event: ApplicationEvent) -> Result<(), DispatchError> {
        let key = *event.target();
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        let mailbox = table
            .get(&key)
            .ok_or(DispatchError::UnknownTarget(key))?;

        tracing::trace!(application = %key, event = %event.event_type(), "dispatch");
        mailbox
            .tx
            .send(Envelope::Event(event))
            .map_err(|_| DispatchError::Closed(key))
    }

    /// Snapshot of the handler for `key`, taken after every event
    /// dispatched to it before this call
    pub async fn snapshot(&self, key: &ApplicationId) -> Result<H::Snapshot, DispatchError> {
        let (reply, rx) = oneshot::channel();
        {
            let table = self.table.read().unwrap_or_else(|e| e.into_inner());
            let mailbox = table
                .get(key)
                .ok_or(DispatchError::UnknownTarget(*key))?;
            mailbox
                .tx
                .send(Envelope::Snapshot(reply))
                .map_err(|_| DispatchError::Closed(*key))?;
        }
        rx.await.map_err(|_| DispatchError::Closed(*key))
    }

    pub fn is_registered(&self, key: &ApplicationId) -> bool {
        self.table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    /// Registered keys in order
    pub fn registered(&self) -> Vec<ApplicationId> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<ApplicationId> = table.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every mailbox and wait for the actors to finish what is
    /// already queued. Returns the number of actors stopped.
    pub async fn shutdown(&self) -> usize {
        let mailboxes: Vec<Mailbox<H::Snapshot>> = {
            let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
            table.drain().map(|(_, mailbox)| mailbox).collect()
        };

        let count = mailboxes.len();
        let joins: Vec<JoinHandle<()>> = mailboxes
            .into_iter()
            .map(|Mailbox { tx, join, .. }| {
                drop(tx);
                join
            })
            .collect();
        for join in joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "application actor aborted");
            }
        }

        tracing::info!(actors = count, "dispatcher shut down");
        count
    }
}

impl Dispatcher<Application> {
    /// Register a new application and deliver its Init event
    pub fn start_application(
        &self,
        id: ApplicationId,
        user: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.register(id, Application::new(id))?;
        self.dispatch(ApplicationEvent::init(id, user))
    }
}

impl<H: EventHandler> Clone for Dispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            effects: self.effects.clone(),
            generations: Arc::clone(&self.generations),
        }
    }
}

/// Exclusive owner of one handler
struct Actor<H: EventHandler> {
    key: ApplicationId,
    generation: u64,
    handler: H,
    mailbox: mpsc::UnboundedReceiver<Envelope<H::Snapshot>>,
    table: Table<H::Snapshot>,
    effects: EffectSender,
}

impl<H: EventHandler> Actor<H> {
    async fn run(mut self) {
        let started = Instant::now();

        while let Some(envelope) = self.mailbox.recv().await {
            match envelope {
                Envelope::Event(event) => {
                    let effects = self.handler.handle(event);
                    if self.handler.is_terminal() {
                        // The key leaves the table before the terminal effect is published.
                        self.deregister();
                        self.publish(effects);
                        self.drain(started);
                        return;
                    }
                    self.publish(effects);
                }
                Envelope::Snapshot(reply) => {
                    let _ = reply.send(self.handler.snapshot());
                }
            }
        }

        tracing::debug!(
            elapsed_ms = elapsed_ms(started),
            "mailbox closed"
        );
    }

    fn publish(&self, effects: Vec<Effect>) {
        for effect in effects {
            if self.effects.send(effect).is_err() {
                tracing::warn!("effect receiver dropped");
            }
        }
    }

    fn deregister(&self) {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        let current = table
            .get(&self.key)
            .is_some_and(|mailbox| mailbox.generation == self.generation);
        if current {
            table.remove(&self.key);
        }
    }

    /// Discard events that arrived behind the terminal one
    fn drain(&mut self, started: Instant) {
        self.mailbox.close();
        let mut discarded = 0u64;
        while let Ok(envelope) = self.mailbox.try_recv() {
            match envelope {
                Envelope::Event(event) => {
                    discarded += 1;
                    tracing::debug!(event = %event.event_type(), "discarding event after terminal state");
                }
                Envelope::Snapshot(reply) => {
                    let _ = reply.send(self.handler.snapshot());
                }
            }
        }

        tracing::info!(
            discarded,
            elapsed_ms = elapsed_ms(started),
            "application retired"
        );
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
