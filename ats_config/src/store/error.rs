// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

/// Failure of a query against the backing store.
///
/// A query that legitimately finds no rows is never a `StoreError`; the store methods model that
/// case with `Option` or an empty `Vec`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or timed out.
    Unavailable(String),
    /// The query failed for any other reason (malformed query, bad data, ...).
    Internal(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl std::error::Error for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
            StoreError::Internal(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<String> for StoreError {
    fn from(msg: String) -> Self {
        StoreError::Internal(msg)
    }
}

impl From<StoreError> for String {
    fn from(err: StoreError) -> Self {
        format!("{err}")
    }
}
