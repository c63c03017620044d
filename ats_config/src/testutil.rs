// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{
    CacheGroup, CacheGroupId, CdnId, DeliveryService, DeliveryServiceId, Parameter, ParameterId,
    ProfileId, Server, ServerId,
};
use crate::store::{
    CdnRow, DeliveryServiceServerRow, ProfileParameterRow, ProfileRow, ServerRow, Snapshot,
    StoreError, TrafficOpsStore,
};

/// A small two-CDN topology used throughout the tests.
///
/// cdn1 has one edge with a primary and a secondary parent (`edge-1`), one edge without parents
/// (`edge-2`), one mid (`mid-1`) and two origin locations. cdn2 has one origin location and one
/// delivery service that must never leak into cdn1's files.
#[derive(Clone, Debug)]
pub struct TestTopology {
    snapshot: Snapshot,
}

impl TestTopology {
    pub const CDN: CdnId = 1;
    pub const OTHER_CDN: CdnId = 2;

    pub const EDGE_PROFILE: ProfileId = 10;
    pub const MID_PROFILE: ProfileId = 11;
    pub const ORG_PROFILE: ProfileId = 12;
    /// Delivery service profile binding every parent.config override.
    pub const DS_PROFILE: ProfileId = 20;
    /// Delivery service profile without any bindings.
    pub const BARE_PROFILE: ProfileId = 21;

    pub const EDGE_EAST: CacheGroupId = 100;
    pub const EDGE_WEST: CacheGroupId = 101;
    pub const MID_EAST: CacheGroupId = 200;
    pub const MID_WEST: CacheGroupId = 201;
    pub const ORIGIN_EAST: CacheGroupId = 300;
    pub const ORIGIN_WEST: CacheGroupId = 301;
    pub const ORIGIN_OTHER: CacheGroupId = 302;

    pub const EDGE_1: ServerId = 1000;
    pub const EDGE_2: ServerId = 1001;
    pub const MID_1: ServerId = 1100;

    pub const DS_1: DeliveryServiceId = 1;
    pub const DS_2: DeliveryServiceId = 2;
    pub const DS_3: DeliveryServiceId = 3;
    pub const DS_OTHER: DeliveryServiceId = 4;

    pub fn new() -> Self {
        let mut topology = TestTopology {
            snapshot: Snapshot {
                cdns: vec![
                    cdn(Self::CDN, "cdn1"),
                    cdn(Self::OTHER_CDN, "cdn2"),
                ],
                profiles: vec![
                    profile(Self::EDGE_PROFILE, "EDGE_ATS"),
                    profile(Self::MID_PROFILE, "MID_ATS"),
                    profile(Self::ORG_PROFILE, "ORG"),
                    profile(Self::DS_PROFILE, "DS_PARENT_OVERRIDES"),
                    profile(Self::BARE_PROFILE, "DS_BARE"),
                ],
                cache_groups: vec![
                    cache_group(
                        Self::EDGE_EAST,
                        "edge-east",
                        "EDGE_LOC",
                        Some(Self::MID_EAST),
                        Some(Self::MID_WEST),
                    ),
                    cache_group(Self::EDGE_WEST, "edge-west", "EDGE_LOC", None, None),
                    cache_group(Self::MID_EAST, "mid-east", "MID_LOC", None, None),
                    cache_group(Self::MID_WEST, "mid-west", "MID_LOC", None, None),
                    cache_group(Self::ORIGIN_EAST, "origin-east", "ORG_LOC", None, None),
                    cache_group(Self::ORIGIN_WEST, "origin-west", "ORG_LOC", None, None),
                    cache_group(Self::ORIGIN_OTHER, "origin-other", "ORG_LOC", None, None),
                ],
                servers: [
                    (Self::EDGE_1, "edge-1", Self::EDGE_EAST, Self::CDN, Self::EDGE_PROFILE, "EDGE"),
                    (Self::EDGE_2, "edge-2", Self::EDGE_WEST, Self::CDN, Self::EDGE_PROFILE, "EDGE"),
                    (Self::MID_1, "mid-1", Self::MID_EAST, Self::CDN, Self::MID_PROFILE, "MID"),
                    (1200, "origin-1", Self::ORIGIN_EAST, Self::CDN, Self::ORG_PROFILE, "ORG"),
                    (1201, "origin-2", Self::ORIGIN_WEST, Self::CDN, Self::ORG_PROFILE, "ORG"),
                    (1202, "origin-3", Self::ORIGIN_OTHER, Self::OTHER_CDN, Self::ORG_PROFILE, "ORG"),
                ]
                .into_iter()
                .map(|(id, host_name, cache_group_id, cdn_id, profile_id, type_name)| {
                    server(id, host_name, cache_group_id, cdn_id, profile_id, type_name)
                })
                .collect(),
                delivery_services: vec![
                    DeliveryService {
                        multi_site_origin: true,
                        ..delivery_service(
                            Self::DS_1,
                            "ds1",
                            Self::CDN,
                            "http://origin1.example.com",
                            Some(Self::DS_PROFILE),
                        )
                    },
                    delivery_service(
                        Self::DS_2,
                        "ds2",
                        Self::CDN,
                        "http://origin2.example.com",
                        Some(Self::BARE_PROFILE),
                    ),
                    delivery_service(
                        Self::DS_3,
                        "ds3",
                        Self::CDN,
                        "http://origin3.example.com",
                        None,
                    ),
                    delivery_service(
                        Self::DS_OTHER,
                        "ds-other",
                        Self::OTHER_CDN,
                        "http://other.example.com",
                        Some(Self::DS_PROFILE),
                    ),
                ],
                ..Snapshot::default()
            },
        };

        topology.add_parameter(1, "global", "tm.toolname", "Traffic Ops");
        topology.add_parameter(2, "global", "tm.url", "https://tm.example.com/");
        for profile_id in [Self::EDGE_PROFILE, Self::MID_PROFILE, Self::ORG_PROFILE] {
            topology.bind_parameter(profile_id, 3, "package", "trafficserver", "7.1.2.el7");
        }
        for (id, name, value) in [
            (10, "psel.qstring_handling", "ignore"),
            (11, "mso.algorithm", "consistent_hash"),
            (12, "mso.parent_retry", "both"),
            (13, "mso.unavailable_server_retry_responses", "\"500,502,503\""),
            (14, "mso.max_simple_retries", "2"),
            (15, "mso.max_unavailable_server_retries", "1"),
        ] {
            topology.bind_parameter(Self::DS_PROFILE, id, "parent.config", name, value);
        }

        topology.assign(Self::EDGE_1, Self::DS_1);
        topology.assign(Self::EDGE_2, Self::DS_2);
        topology
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    pub fn snapshot_mut(&mut self) -> &mut Snapshot {
        &mut self.snapshot
    }

    /// Bind a parameter to a profile, creating the parameter row if `id` is new.
    pub fn bind_parameter(
        &mut self,
        profile_id: ProfileId,
        id: ParameterId,
        config_file: &str,
        name: &str,
        value: &str,
    ) {
        self.add_parameter(id, config_file, name, value);
        self.snapshot.profile_parameters.push(ProfileParameterRow {
            profile: profile_id,
            parameter: id,
        });
    }

    /// Assign a delivery service to an edge server, after any existing assignments.
    pub fn assign(&mut self, server: ServerId, delivery_service: DeliveryServiceId) {
        self.snapshot
            .delivery_service_servers
            .push(DeliveryServiceServerRow {
                delivery_service,
                server,
            });
    }

    /// Point the package version of every cache profile at `version`.
    pub fn set_package_version(&mut self, version: &str) {
        for parameter in &mut self.snapshot.parameters {
            if parameter.id == 3 {
                parameter.value = version.to_owned();
            }
        }
    }

    fn add_parameter(&mut self, id: ParameterId, config_file: &str, name: &str, value: &str) {
        if self.snapshot.parameters.iter().any(|p| p.id == id) {
            return;
        }
        self.snapshot.parameters.push(Parameter {
            id,
            name: name.to_owned(),
            config_file: config_file.to_owned(),
            value: value.to_owned(),
        });
    }
}

impl Default for TestTopology {
    fn default() -> Self {
        Self::new()
    }
}

fn cdn(id: CdnId, name: &str) -> CdnRow {
    CdnRow {
        id,
        name: name.to_owned(),
        domain_name: format!("{name}.example.com"),
    }
}

fn profile(id: ProfileId, name: &str) -> ProfileRow {
    ProfileRow {
        id,
        name: name.to_owned(),
    }
}

fn cache_group(
    id: CacheGroupId,
    name: &str,
    type_name: &str,
    parent: Option<CacheGroupId>,
    secondary_parent: Option<CacheGroupId>,
) -> CacheGroup {
    CacheGroup {
        id,
        name: name.to_owned(),
        type_name: type_name.to_owned(),
        parent_cache_group_id: parent,
        secondary_parent_cache_group_id: secondary_parent,
    }
}

fn server(
    id: ServerId,
    host_name: &str,
    cache_group_id: CacheGroupId,
    cdn_id: CdnId,
    profile_id: ProfileId,
    type_name: &str,
) -> ServerRow {
    ServerRow {
        id,
        host_name: host_name.to_owned(),
        domain_name: "example.com".to_owned(),
        tcp_port: 80,
        cache_group_id,
        cdn_id,
        profile_id,
        type_name: type_name.to_owned(),
        status: "REPORTED".to_owned(),
        update_pending: false,
    }
}

fn delivery_service(
    id: DeliveryServiceId,
    xml_id: &str,
    cdn_id: CdnId,
    org_server_fqdn: &str,
    profile_id: Option<ProfileId>,
) -> DeliveryService {
    DeliveryService {
        id,
        xml_id: xml_id.to_owned(),
        cdn_id,
        org_server_fqdn: org_server_fqdn.to_owned(),
        type_name: "HTTP".to_owned(),
        qstring_ignore: 0,
        origin_shield: None,
        multi_site_origin: false,
        profile_id,
    }
}

/// Counts every call made into the wrapped store.
#[derive(Clone, Debug)]
pub struct CountMethodCallsStore<S> {
    inner: S,
    pub call_count: Arc<AtomicUsize>,
}

impl<S> CountMethodCallsStore<S> {
    pub fn new(inner: S) -> Self {
        CountMethodCallsStore {
            inner,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S> TrafficOpsStore for CountMethodCallsStore<S>
where
    S: TrafficOpsStore + Send + Sync + 'static,
{
    async fn server_by_host_name(&self, host_name: &str) -> Result<Option<Server>, StoreError> {
        self.count();
        self.inner.server_by_host_name(host_name).await
    }

    async fn delivery_services_by_cdn(
        &self,
        cdn_id: CdnId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        self.count();
        self.inner.delivery_services_by_cdn(cdn_id).await
    }

    async fn delivery_services_by_server(
        &self,
        server_id: ServerId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        self.count();
        self.inner.delivery_services_by_server(server_id).await
    }

    async fn profile_parameter(
        &self,
        profile_id: ProfileId,
        config_file: &str,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        self.count();
        self.inner
            .profile_parameter(profile_id, config_file, name)
            .await
    }

    async fn global_parameter(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.count();
        self.inner.global_parameter(name).await
    }

    async fn cache_group(&self, id: CacheGroupId) -> Result<Option<CacheGroup>, StoreError> {
        self.count();
        self.inner.cache_group(id).await
    }

    async fn cache_groups_by_type(
        &self,
        cdn_id: CdnId,
        type_name: &str,
    ) -> Result<Vec<CacheGroupId>, StoreError> {
        self.count();
        self.inner.cache_groups_by_type(cdn_id, type_name).await
    }
}

/// Fails every lookup of one parameter name and passes everything else through.
#[derive(Clone, Debug)]
pub struct FailingParameterStore<S> {
    inner: S,
    parameter_name: String,
}

impl<S> FailingParameterStore<S> {
    pub fn new(inner: S, parameter_name: &str) -> Self {
        FailingParameterStore {
            inner,
            parameter_name: parameter_name.to_owned(),
        }
    }

    fn check(&self, name: &str) -> Result<(), StoreError> {
        if name == self.parameter_name {
            Err(StoreError::Unavailable(format!("injected failure for {name}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S> TrafficOpsStore for FailingParameterStore<S>
where
    S: TrafficOpsStore + Send + Sync + 'static,
{
    async fn server_by_host_name(&self, host_name: &str) -> Result<Option<Server>, StoreError> {
        self.inner.server_by_host_name(host_name).await
    }

    async fn delivery_services_by_cdn(
        &self,
        cdn_id: CdnId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        self.inner.delivery_services_by_cdn(cdn_id).await
    }

    async fn delivery_services_by_server(
        &self,
        server_id: ServerId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        self.inner.delivery_services_by_server(server_id).await
    }

    async fn profile_parameter(
        &self,
        profile_id: ProfileId,
        config_file: &str,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        self.check(name)?;
        self.inner
            .profile_parameter(profile_id, config_file, name)
            .await
    }

    async fn global_parameter(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.check(name)?;
        self.inner.global_parameter(name).await
    }

    async fn cache_group(&self, id: CacheGroupId) -> Result<Option<CacheGroup>, StoreError> {
        self.inner.cache_group(id).await
    }

    async fn cache_groups_by_type(
        &self,
        cdn_id: CdnId,
        type_name: &str,
    ) -> Result<Vec<CacheGroupId>, StoreError> {
        self.inner.cache_groups_by_type(cdn_id, type_name).await
    }
}
