// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::str::FromStr;

use serde::Deserialize;
use service_util::infra::InfraConfig;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
pub struct MemoryStoreConfig {
    /// Path of a YAML (or `.json`) snapshot of the Traffic Ops tables.
    pub snapshot_path: String,

    /// How often to check the snapshot file for changes. The snapshot is loaded once at
    /// startup and never reloaded if this is not set.
    pub refresh_frequency_s: Option<u64>,
}

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    Memory(MemoryStoreConfig),
    /// Fails every query. Useful for exercising alerting.
    AlwaysErrors,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    /// Address on which to serve the config file API.
    pub listen_address: String,

    #[serde(with = "serde_yaml::with::singleton_map")]
    pub store: StoreConfig,

    /// Admin endpoints configuration.
    pub infra: Option<InfraConfig>,
}

impl FromStr for Config {
    type Err = String;

    fn from_str(raw_config: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(raw_config).map_err(|e| format!("config parse error: {e}"))
    }
}
