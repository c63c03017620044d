// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use serde::Serialize;

use crate::error::DerivationError;
use crate::model::{CacheGroupId, Server, MID_TYPE_PREFIX, ORIGIN_LOCATION_TYPE};
use crate::store::TrafficOpsStore;

/// Position of a cache in the delivery hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Mid-tier cache sitting between the edges and the origins.
    OriginTier,
    /// Client-facing cache.
    EdgeTier,
}

impl Role {
    pub fn of(server: &Server) -> Role {
        if server.type_name.starts_with(MID_TYPE_PREFIX) {
            Role::OriginTier
        } else {
            Role::EdgeTier
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::OriginTier => "origin_tier",
            Role::EdgeTier => "edge_tier",
        }
    }
}

/// Major component of an ATS package version, e.g. `7` for `7.1.2.el7`.
pub fn ats_major_version(version: &str) -> &str {
    match version.split_once('.') {
        Some((major, _)) => major,
        None => version,
    }
}

/// Cache groups a server forwards cache misses to.
///
/// Edge servers have at most one entry on each side. For origin-tier servers `primary` holds
/// every origin location of the CDN and `secondary` is always empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParentCacheGroups {
    pub primary: Vec<CacheGroupId>,
    pub secondary: Vec<CacheGroupId>,
}

pub async fn parent_cache_groups_of<S>(
    store: &S,
    server: &Server,
    role: Role,
) -> Result<ParentCacheGroups, DerivationError>
where
    S: TrafficOpsStore + Send + Sync + ?Sized,
{
    match role {
        Role::OriginTier => {
            let primary = store
                .cache_groups_by_type(server.cdn_id, ORIGIN_LOCATION_TYPE)
                .await
                .map_err(DerivationError::store(
                    "origin location cache groups",
                    format!("cdn {}", server.cdn),
                ))?;
            Ok(ParentCacheGroups {
                primary,
                secondary: Vec::new(),
            })
        }
        Role::EdgeTier => {
            let cache_group = store
                .cache_group(server.cache_group_id)
                .await
                .map_err(DerivationError::store(
                    "parent cache groups",
                    format!("cache group {}", server.cache_group_id),
                ))?
                .ok_or_else(|| {
                    DerivationError::NotFound(format!(
                        "cache group {} of server {}",
                        server.cache_group_id, server.host_name
                    ))
                })?;
            Ok(ParentCacheGroups {
                primary: cache_group.parent_cache_group_id.into_iter().collect(),
                secondary: cache_group
                    .secondary_parent_cache_group_id
                    .into_iter()
                    .collect(),
            })
        }
    }
}
