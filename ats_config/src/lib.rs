// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
#![allow(clippy::new_without_default)]

pub mod api;
pub mod assembler;
pub mod clock;
pub mod delivery_services;
pub mod engine;
pub mod error;
pub mod model;
pub mod overrides;
pub mod parameters;
pub mod store;
pub mod topology;

pub use engine::{ConfigEngine, ConfigFile, ConfigFileKind};
pub use error::DerivationError;

pub mod testutil;
