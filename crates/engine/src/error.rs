// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the dispatcher

use nm_core::ApplicationId;
use thiserror::Error;

/// Errors returned to producers by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("application not found: {0}")]
    UnknownTarget(ApplicationId),
    #[error("application already registered: {0}")]
    AlreadyRegistered(ApplicationId),
    #[error("application mailbox closed: {0}")]
    Closed(ApplicationId),
}
