// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application, attempt and container identifiers
//!
//! Identifiers render in the cluster-wide textual form
//! (`application_<ts>_<id>`, `container_<ts>_<id>_<attempt>_<seq>`) and
//! serialize as that string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing an identifier from text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} id: {text:?}")]
pub struct ParseIdError {
    pub kind: &'static str,
    pub text: String,
}

impl ParseIdError {
    fn new(kind: &'static str, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
        }
    }
}

/// Identifier for one submitted application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApplicationId {
    pub cluster_timestamp: u64,
    pub id: u32,
}

impl ApplicationId {
    pub fn new(cluster_timestamp: u64, id: u32) -> Self {
        Self {
            cluster_timestamp,
            id,
        }
    }

    /// Attempt `attempt` of this application
    pub fn attempt(self, attempt: u32) -> AttemptId {
        AttemptId {
            application: self,
            attempt,
        }
    }
}

/// Identifier for one attempt of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttemptId {
    pub application: ApplicationId,
    pub attempt: u32,
}

impl AttemptId {
    /// Container `sequence` allocated to this attempt
    pub fn container(self, sequence: u64) -> ContainerId {
        ContainerId {
            attempt: self,
            sequence,
        }
    }
}

/// Identifier for one container of an application attempt.
///
/// Unique for the lifetime of the cluster session. Ordering follows
/// application, then attempt, then sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId {
    pub attempt: AttemptId,
    pub sequence: u64,
}

impl ContainerId {
    /// The application this container belongs to (routing key)
    pub fn application_id(&self) -> ApplicationId {
        self.attempt.application
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "application_{}_{:04}", self.cluster_timestamp, self.id)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "appattempt_{}_{:04}_{:06}",
            self.application.cluster_timestamp, self.application.id, self.attempt
        )
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let app = self.attempt.application;
        write!(
            f,
            "container_{}_{:04}_{:02}_{:06}",
            app.cluster_timestamp, app.id, self.attempt.attempt, self.sequence
        )
    }
}

/// Split `text` into `N` numeric fields after the expected prefix
fn numeric_fields<const N: usize>(
    kind: &'static str,
    prefix: &str,
    text: &str,
) -> Result<[u64; N], ParseIdError> {
    let err = || ParseIdError::new(kind, text);
    let rest = text
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or_else(err)?;

    let mut fields = [0u64; N];
    let mut parts = rest.split('_');
    for field in fields.iter_mut() {
        let part = parts.next().ok_or_else(err)?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        *field = part.parse().map_err(|_| err())?;
    }
    if parts.next().is_some() {
        return Err(err());
    }
    Ok(fields)
}

fn narrow(kind: &'static str, text: &str, value: u64) -> Result<u32, ParseIdError> {
    u32::try_from(value).map_err(|_| ParseIdError::new(kind, text))
}

impl FromStr for ApplicationId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [ts, id] = numeric_fields::<2>("application", "application", s)?;
        Ok(ApplicationId::new(ts, narrow("application", s, id)?))
    }
}

impl FromStr for AttemptId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [ts, id, attempt] = numeric_fields::<3>("attempt", "appattempt", s)?;
        Ok(ApplicationId::new(ts, narrow("attempt", s, id)?).attempt(narrow("attempt", s, attempt)?))
    }
}

impl FromStr for ContainerId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [ts, id, attempt, seq] = numeric_fields::<4>("container", "container", s)?;
        Ok(ApplicationId::new(ts, narrow("container", s, id)?)
            .attempt(narrow("container", s, attempt)?)
            .container(seq))
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = ParseIdError;

                fn try_from(s: String) -> Result<Self, Self::Error> {
                    s.parse()
                }
            }

            impl From<$ty> for String {
                fn from(id: $ty) -> String {
                    id.to_string()
                }
            }
        )*
    };
}

string_conversions!(ApplicationId, AttemptId, ContainerId);

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
