// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for qr-core operations.

use thiserror::Error;

/// All possible errors that can occur in qr-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid task: '{0}'\n  hint: valid tasks are: task1, task2")]
    InvalidTaskKey(String),

    #[error("invalid event type: '{0}'\n  hint: valid types are: focus, blur, typing")]
    InvalidEventType(String),

    #[error(
        "invalid attempt status: '{0}'\n  hint: valid statuses are: draft, submitted, expired"
    )]
    InvalidAttemptStatus(String),

    #[error("invalid error kind: '{0}'")]
    InvalidErrorKind(String),

    #[error("attempt id cannot be empty")]
    EmptyAttemptId,

    #[error("{0}")]
    InvalidInput(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for qr-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
