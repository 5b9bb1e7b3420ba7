// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::autosave::AutosaveError;
use crate::queue::QueueError;

/// Errors surfaced by the `quire` command line.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Autosave(#[from] AutosaveError),

    #[error("offline queue error: {0}")]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Core(#[from] qr_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
