// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-lines replay of inbound collaborator events
//!
//! Each input line is one [`InboundRecord`]. Outbound effects are written
//! back as one JSON object per line.

use nm_core::{Application, ApplicationEvent, ApplicationId, ContainerId, Effect};
use nm_engine::{DispatchError, Dispatcher, EffectReceiver};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: {source}")]
    Encoding {
        line: usize,
        #[source]
        source: std::str::Utf8Error,
    },
}

/// One inbound record, as produced by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum InboundRecord {
    /// Start tracking an application
    Init {
        application: ApplicationId,
        user: String,
    },
    /// A fully spelled out event
    Event(ApplicationEvent),
    Initialized(ApplicationId),
    ContainerLaunched(ContainerId),
    ContainerFinished(ContainerId),
    NoMoreContainers(ApplicationId),
    Finish(ApplicationId),
    Fail {
        application: ApplicationId,
        reason: String,
    },
}

impl InboundRecord {
    /// Hand the record to the dispatcher
    pub fn apply(self, dispatcher: &Dispatcher<Application>) -> Result<(), DispatchError> {
        let event = match self {
            InboundRecord::Init { application, user } => {
                return dispatcher.start_application(application, user);
            }
            InboundRecord::Event(event) => event,
            InboundRecord::Initialized(id) => ApplicationEvent::initialized(id),
            InboundRecord::ContainerLaunched(id) => ApplicationEvent::container_launched(id),
            InboundRecord::ContainerFinished(id) => ApplicationEvent::container_finished(id),
            InboundRecord::NoMoreContainers(id) => ApplicationEvent::no_more_containers(id),
            InboundRecord::Finish(id) => ApplicationEvent::finish_request(id),
            InboundRecord::Fail {
                application,
                reason,
            } => ApplicationEvent::fail(application, reason),
        };
        dispatcher.dispatch(event)
    }
}

/// Decode one raw input line. Invalid UTF-8 is a malformed line.
pub fn decode_line(line_no: usize, bytes: &[u8]) -> Result<&str, ReplayError> {
    std::str::from_utf8(bytes).map_err(|source| ReplayError::Encoding {
        line: line_no,
        source,
    })
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<InboundRecord>, ReplayError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| ReplayError::Parse {
            line: line_no,
            source,
        })
}

/// Counters from one replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub records: usize,
    pub dispatched: usize,
    pub rejected: usize,
}

/// Feed every record from `input` to `dispatcher`.
///
/// Malformed lines and dispatch errors are logged and counted; only a read
/// failure stops the replay.
pub async fn replay<R>(
    mut input: R,
    dispatcher: &Dispatcher<Application>,
) -> Result<ReplayStats, ReplayError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReplayStats::default();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        line_no += 1;
        let parsed = decode_line(line_no, &buf).and_then(|line| parse_line(line_no, line));
        let record = match parsed {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(error = %e, "skipping malformed record");
                stats.rejected += 1;
                continue;
            }
        };

        stats.records += 1;
        let late_finish = matches!(record, InboundRecord::ContainerFinished(_));
        match record.apply(dispatcher) {
            Ok(()) => stats.dispatched += 1,
            // At-least-once delivery can repeat a finish after the application retired
            Err(e @ DispatchError::UnknownTarget(_)) if late_finish => {
                tracing::warn!(line = line_no, error = %e, "container finish for unknown application");
                stats.rejected += 1;
            }
            Err(e) => {
                tracing::error!(line = line_no, error = %e, "dispatch failed");
                stats.rejected += 1;
            }
        }
    }

    tracing::info!(
        records = stats.records,
        dispatched = stats.dispatched,
        rejected = stats.rejected,
        "replay complete"
    );
    Ok(stats)
}

/// Write effects as JSON lines until every effect sender is gone.
/// Returns the number of effects written.
pub async fn write_effects<W>(mut effects: EffectReceiver, mut out: W) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(effect) = effects.recv().await {
        out.write_all(&encode(&effect)?).await?;
        written += 1;
    }
    out.flush().await?;
    Ok(written)
}

fn encode(effect: &Effect) -> std::io::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(effect)?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
