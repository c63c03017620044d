// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;

use crate::assembler::{assemble, Provenance};
use crate::clock::{Clock, SystemClock};
use crate::delivery_services::delivery_services_for;
use crate::error::DerivationError;
use crate::model::Server;
use crate::overrides::resolve_all;
use crate::parameters::tool_identity;
use crate::store::ArcStore;
use crate::topology::{ats_major_version, parent_cache_groups_of, ParentCacheGroups, Role};


pub const TEXT_PLAIN: &str = "text/plain";

/// Config file kinds the engine knows how to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFileKind {
    ParentConfig,
}

impl ConfigFileKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ConfigFileKind::ParentConfig => "parent.config",
        }
    }
}

impl FromStr for ConfigFileKind {
    type Err = DerivationError;

    fn from_str(file_name: &str) -> Result<Self, Self::Err> {
        match file_name {
            "parent.config" => Ok(ConfigFileKind::ParentConfig),
            other => Err(DerivationError::UnsupportedFileKind(other.to_owned())),
        }
    }
}

/// A generated config file, ready to be served.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigFile {
    pub content_type: &'static str,
    pub body: String,
}

/// A server together with everything derived from its own row and cache group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedServer {
    pub server: Server,
    pub role: Role,
    /// Major ATS version, e.g. `7`.
    pub ats_version: String,
    pub parents: ParentCacheGroups,
}

/// Summary of a server as seen by cache-side config managers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServerMetadata {
    pub host_name: String,
    pub domain_name: String,
    pub tcp_port: u16,
    pub cdn: String,
    pub cache_group: String,
    pub profile: String,
    pub status: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub update_pending: bool,
    pub ats_version: String,
    pub role: Role,
    pub parents: ParentCacheGroups,
    pub delivery_services: Vec<String>,
}

/// Derives per-server config files from the current contents of a `TrafficOpsStore`.
///
/// The engine holds no state of its own: every call reads what it needs from the store and
/// concurrent calls do not interact.
#[derive(Clone)]
pub struct ConfigEngine {
    store: ArcStore,
    clock: Arc<dyn Clock>,
}

impl ConfigEngine {
    pub fn new(store: ArcStore, clock: Arc<dyn Clock>) -> Self {
        ConfigEngine { store, clock }
    }

    pub fn with_system_clock(store: ArcStore) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    /// Generate the config file `file_name` for `host_name`.
    pub async fn config_file(
        &self,
        host_name: &str,
        file_name: &str,
    ) -> Result<ConfigFile, DerivationError> {
        let kind: ConfigFileKind = file_name.parse()?;

        let start_time = Instant::now();
        let result = match kind {
            ConfigFileKind::ParentConfig => self.parent_config(host_name).await,
        };

        let result_label = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind_label(),
        };
        counter!(
            "ats_config_derivations_total",
            1,
            "file" => kind.file_name(),
            "result" => result_label,
        );
        histogram!(
            "ats_config_derivation_seconds",
            start_time.elapsed(),
            "file" => kind.file_name(),
        );

        result.map(|body| ConfigFile {
            content_type: TEXT_PLAIN,
            body,
        })
    }

    /// Load a server and resolve its role, ATS version and parent cache groups.
    pub async fn resolve_server(&self, host_name: &str) -> Result<ResolvedServer, DerivationError> {
        let server = self
            .store
            .server_by_host_name(host_name)
            .await
            .map_err(DerivationError::store("server", host_name))?
            .ok_or_else(|| DerivationError::NotFound(format!("server {host_name}")))?;

        let ats_version = server
            .package_version
            .as_deref()
            .map(|v| ats_major_version(v).to_owned())
            .ok_or_else(|| {
                DerivationError::NotFound(format!(
                    "trafficserver package version for server {host_name}"
                ))
            })?;

        let role = Role::of(&server);
        let parents = parent_cache_groups_of(&*self.store, &server, role).await?;
        log::debug!(
            "{host_name}: role {}, primary parents {:?}, secondary parents {:?}",
            role.label(),
            parents.primary,
            parents.secondary
        );

        Ok(ResolvedServer {
            server,
            role,
            ats_version,
            parents,
        })
    }

    /// Generate the text of `parent.config` for `host_name`.
    pub async fn parent_config(&self, host_name: &str) -> Result<String, DerivationError> {
        let resolved = self.resolve_server(host_name).await?;
        let tool = tool_identity(&*self.store).await?;
        let generated_at = self.clock.now();

        let delivery_services =
            delivery_services_for(&*self.store, &resolved.server, resolved.role).await?;
        let delivery_services = resolve_all(&*self.store, delivery_services).await?;

        let provenance = Provenance {
            tool: &tool,
            host_name: &resolved.server.host_name,
            generated_at,
        };
        Ok(assemble(&provenance, &resolved, &delivery_services))
    }

    pub async fn server_metadata(&self, host_name: &str) -> Result<ServerMetadata, DerivationError> {
        let resolved = self.resolve_server(host_name).await?;
        let delivery_services =
            delivery_services_for(&*self.store, &resolved.server, resolved.role).await?;

        let ResolvedServer {
            server,
            role,
            ats_version,
            parents,
        } = resolved;
        Ok(ServerMetadata {
            host_name: server.host_name,
            domain_name: server.domain_name,
            tcp_port: server.tcp_port,
            cdn: server.cdn,
            cache_group: server.cache_group,
            profile: server.profile,
            status: server.status,
            type_name: server.type_name,
            update_pending: server.update_pending,
            ats_version,
            role,
            parents,
            delivery_services: delivery_services.into_iter().map(|ds| ds.xml_id).collect(),
        })
    }
}
