// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use serde::{Deserialize, Serialize};

pub type ServerId = i64;

pub type CacheGroupId = i64;

pub type CdnId = i64;

pub type ProfileId = i64;

pub type ParameterId = i64;

pub type DeliveryServiceId = i64;

/// Type label prefix carried by mid-tier caches.
pub const MID_TYPE_PREFIX: &str = "MID";

/// Cache-group type label for origin locations.
pub const ORIGIN_LOCATION_TYPE: &str = "ORG_LOC";

/// A cache server joined with its cache group, status, profile, CDN and type.
///
/// `package_version` is the raw value of the profile's `trafficserver` package parameter; it is
/// `None` when the profile does not bind one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Server {
    pub id: ServerId,
    pub host_name: String,
    pub domain_name: String,
    pub tcp_port: u16,
    pub cache_group_id: CacheGroupId,
    pub cache_group: String,
    pub profile_id: ProfileId,
    pub profile: String,
    pub cdn_id: CdnId,
    pub cdn: String,
    pub status: String,
    pub type_name: String,
    pub update_pending: bool,
    pub package_version: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheGroup {
    pub id: CacheGroupId,
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub parent_cache_group_id: Option<CacheGroupId>,
    #[serde(default)]
    pub secondary_parent_cache_group_id: Option<CacheGroupId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryService {
    pub id: DeliveryServiceId,
    pub xml_id: String,
    pub cdn_id: CdnId,
    #[serde(default)]
    pub org_server_fqdn: String,
    pub type_name: String,
    #[serde(default)]
    pub qstring_ignore: i64,
    #[serde(default)]
    pub origin_shield: Option<String>,
    #[serde(default)]
    pub multi_site_origin: bool,
    #[serde(default)]
    pub profile_id: Option<ProfileId>,
}

impl DeliveryService {
    /// Profile ids of zero are treated the same as a missing profile.
    pub fn profile(&self) -> Option<ProfileId> {
        self.profile_id.filter(|id| *id != 0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: ParameterId,
    pub name: String,
    pub config_file: String,
    pub value: String,
}
