// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

use crate::store::StoreError;

/// Reasons a config file could not be derived. No variant ever carries partial output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DerivationError {
    /// The server does not exist, or a row required to describe it is missing.
    NotFound(String),
    /// No generator exists for the requested config file kind.
    UnsupportedFileKind(String),
    /// A store query failed. `operation` names the derivation stage and `key` the value that was
    /// being looked up.
    Store {
        operation: &'static str,
        key: String,
        source: StoreError,
    },
}

impl DerivationError {
    /// Returns a closure for `map_err` which attaches lookup context to a `StoreError`.
    pub fn store(
        operation: &'static str,
        key: impl Into<String>,
    ) -> impl FnOnce(StoreError) -> DerivationError {
        let key = key.into();
        move |source| DerivationError::Store {
            operation,
            key,
            source,
        }
    }

    /// Short label for metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            DerivationError::NotFound(_) => "not_found",
            DerivationError::UnsupportedFileKind(_) => "unsupported_file",
            DerivationError::Store { .. } => "store_error",
        }
    }
}

impl std::error::Error for DerivationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DerivationError::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for DerivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivationError::NotFound(what) => write!(f, "Not found: {what}"),
            DerivationError::UnsupportedFileKind(kind) => {
                write!(f, "Unsupported config file kind: {kind}")
            }
            DerivationError::Store {
                operation,
                key,
                source,
            } => write!(f, "Querying {operation} for `{key}`: {source}"),
        }
    }
}
