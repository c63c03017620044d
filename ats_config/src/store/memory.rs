// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{
    CacheGroup, CacheGroupId, CdnId, DeliveryService, DeliveryServiceId, Parameter, ParameterId,
    ProfileId, Server, ServerId,
};
use crate::parameters::{GLOBAL_SCOPE, PACKAGE_SCOPE, TRAFFICSERVER_PACKAGE};
use crate::store::{StoreError, TrafficOpsStore};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnRow {
    pub id: CdnId,
    pub name: String,
    #[serde(default)]
    pub domain_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: ProfileId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileParameterRow {
    pub profile: ProfileId,
    pub parameter: ParameterId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRow {
    pub id: ServerId,
    pub host_name: String,
    #[serde(default)]
    pub domain_name: String,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    pub cache_group_id: CacheGroupId,
    pub cdn_id: CdnId,
    pub profile_id: ProfileId,
    pub type_name: String,
    pub status: String,
    #[serde(default)]
    pub update_pending: bool,
}

fn default_tcp_port() -> u16 {
    80
}

/// Assignment of a delivery service to an edge server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryServiceServerRow {
    pub delivery_service: DeliveryServiceId,
    pub server: ServerId,
}

/// A point-in-time copy of the relational tables read by the engine.
///
/// Row order is significant: delivery services are returned in the order they appear in
/// `delivery_services`, and edge assignments in the order of `delivery_service_servers`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub cdns: Vec<CdnRow>,
    pub profiles: Vec<ProfileRow>,
    pub parameters: Vec<Parameter>,
    pub profile_parameters: Vec<ProfileParameterRow>,
    pub cache_groups: Vec<CacheGroup>,
    pub servers: Vec<ServerRow>,
    pub delivery_services: Vec<DeliveryService>,
    pub delivery_service_servers: Vec<DeliveryServiceServerRow>,
}

impl Snapshot {
    pub fn from_yaml(raw: &str) -> Result<Self, String> {
        serde_yaml::from_str(raw).map_err(|e| format!("snapshot parse error: {e}"))
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("snapshot parse error: {e}"))
    }

    fn server_by_host_name(&self, host_name: &str) -> Option<Server> {
        let row = self.servers.iter().find(|s| s.host_name == host_name)?;
        let cache_group = self.cache_groups.iter().find(|c| c.id == row.cache_group_id)?;
        let cdn = self.cdns.iter().find(|c| c.id == row.cdn_id)?;
        let profile = self.profiles.iter().find(|p| p.id == row.profile_id)?;

        Some(Server {
            id: row.id,
            host_name: row.host_name.clone(),
            domain_name: row.domain_name.clone(),
            tcp_port: row.tcp_port,
            cache_group_id: cache_group.id,
            cache_group: cache_group.name.clone(),
            profile_id: profile.id,
            profile: profile.name.clone(),
            cdn_id: cdn.id,
            cdn: cdn.name.clone(),
            status: row.status.clone(),
            type_name: row.type_name.clone(),
            update_pending: row.update_pending,
            package_version: self.profile_parameter(
                profile.id,
                PACKAGE_SCOPE,
                TRAFFICSERVER_PACKAGE,
            ),
        })
    }

    fn delivery_services_by_cdn(&self, cdn_id: CdnId) -> Vec<DeliveryService> {
        self.delivery_services
            .iter()
            .filter(|ds| ds.cdn_id == cdn_id)
            .cloned()
            .collect()
    }

    fn delivery_services_by_server(&self, server_id: ServerId) -> Vec<DeliveryService> {
        self.delivery_service_servers
            .iter()
            .filter(|dss| dss.server == server_id)
            .filter_map(|dss| {
                self.delivery_services
                    .iter()
                    .find(|ds| ds.id == dss.delivery_service)
                    .cloned()
            })
            .collect()
    }

    fn profile_parameter(
        &self,
        profile_id: ProfileId,
        config_file: &str,
        name: &str,
    ) -> Option<String> {
        let bound: HashSet<ParameterId> = self
            .profile_parameters
            .iter()
            .filter(|pp| pp.profile == profile_id)
            .map(|pp| pp.parameter)
            .collect();

        self.parameters
            .iter()
            .filter(|p| bound.contains(&p.id) && p.config_file == config_file && p.name == name)
            .min_by_key(|p| p.id)
            .map(|p| p.value.clone())
    }

    fn global_parameter(&self, name: &str) -> Option<String> {
        self.parameters
            .iter()
            .filter(|p| p.config_file == GLOBAL_SCOPE && p.name == name)
            .min_by_key(|p| p.id)
            .map(|p| p.value.clone())
    }

    fn cache_groups_by_type(&self, cdn_id: CdnId, type_name: &str) -> Vec<CacheGroupId> {
        self.cache_groups
            .iter()
            .filter(|cg| cg.type_name == type_name)
            .filter(|cg| {
                self.servers
                    .iter()
                    .any(|s| s.cache_group_id == cg.id && s.cdn_id == cdn_id)
            })
            .map(|cg| cg.id)
            .collect()
    }
}

/// A `TrafficOpsStore` answering queries from an in-memory `Snapshot`.
///
/// The snapshot can be replaced at any time with `swap_snapshot`; queries already running keep
/// the snapshot they loaded.
#[derive(Clone)]
pub struct MemoryStore {
    snapshot: Arc<ArcSwap<Snapshot>>,
}

impl MemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        MemoryStore {
            snapshot: Arc::new(ArcSwap::from_pointee(snapshot)),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn swap_snapshot(&self, snapshot: Snapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

#[async_trait]
impl TrafficOpsStore for MemoryStore {
    async fn server_by_host_name(&self, host_name: &str) -> Result<Option<Server>, StoreError> {
        Ok(self.snapshot.load().server_by_host_name(host_name))
    }

    async fn delivery_services_by_cdn(
        &self,
        cdn_id: CdnId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        Ok(self.snapshot.load().delivery_services_by_cdn(cdn_id))
    }

    async fn delivery_services_by_server(
        &self,
        server_id: ServerId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        Ok(self.snapshot.load().delivery_services_by_server(server_id))
    }

    async fn profile_parameter(
        &self,
        profile_id: ProfileId,
        config_file: &str,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .snapshot
            .load()
            .profile_parameter(profile_id, config_file, name))
    }

    async fn global_parameter(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.snapshot.load().global_parameter(name))
    }

    async fn cache_group(&self, id: CacheGroupId) -> Result<Option<CacheGroup>, StoreError> {
        Ok(self
            .snapshot
            .load()
            .cache_groups
            .iter()
            .find(|cg| cg.id == id)
            .cloned())
    }

    async fn cache_groups_by_type(
        &self,
        cdn_id: CdnId,
        type_name: &str,
    ) -> Result<Vec<CacheGroupId>, StoreError> {
        Ok(self.snapshot.load().cache_groups_by_type(cdn_id, type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, Snapshot};
    use crate::store::TrafficOpsStore;
    use crate::testutil::TestTopology;

    #[tokio::test]
    async fn server_join() {
        let store = MemoryStore::new(TestTopology::new().snapshot());

        let server = store
            .server_by_host_name("edge-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(server.cache_group, "edge-east");
        assert_eq!(server.cdn, "cdn1");
        assert_eq!(server.profile, "EDGE_ATS");
        assert_eq!(server.package_version.as_deref(), Some("7.1.2.el7"));

        assert!(store
            .server_by_host_name("no-such-host")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn server_without_cache_group_row_is_not_found() {
        let mut snapshot = TestTopology::new().snapshot();
        snapshot.cache_groups.retain(|cg| cg.name != "edge-east");
        let store = MemoryStore::new(snapshot);

        assert!(store
            .server_by_host_name("edge-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_parameters_resolve_to_lowest_id() {
        let mut topology = TestTopology::new();
        topology.bind_parameter(
            TestTopology::BARE_PROFILE,
            900,
            "parent.config",
            "psel.qstring_handling",
            "consider",
        );
        topology.bind_parameter(
            TestTopology::BARE_PROFILE,
            800,
            "parent.config",
            "psel.qstring_handling",
            "ignore",
        );
        let store = MemoryStore::new(topology.snapshot());

        let value = store
            .profile_parameter(
                TestTopology::BARE_PROFILE,
                "parent.config",
                "psel.qstring_handling",
            )
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("ignore"));

        // Same name under another scope is a distinct binding.
        let value = store
            .profile_parameter(
                TestTopology::BARE_PROFILE,
                "records.config",
                "psel.qstring_handling",
            )
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn edge_assignment_order_is_preserved() {
        let mut topology = TestTopology::new();
        topology.assign(TestTopology::EDGE_1, TestTopology::DS_3);
        let store = MemoryStore::new(topology.snapshot());

        let xml_ids: Vec<_> = store
            .delivery_services_by_server(TestTopology::EDGE_1)
            .await
            .unwrap()
            .into_iter()
            .map(|ds| ds.xml_id)
            .collect();
        assert_eq!(xml_ids, vec!["ds1", "ds3"]);
    }

    #[tokio::test]
    async fn origin_locations_are_scoped_to_cdn() {
        let store = MemoryStore::new(TestTopology::new().snapshot());

        let groups = store
            .cache_groups_by_type(TestTopology::CDN, "ORG_LOC")
            .await
            .unwrap();
        assert_eq!(
            groups,
            vec![TestTopology::ORIGIN_EAST, TestTopology::ORIGIN_WEST]
        );

        let groups = store
            .cache_groups_by_type(TestTopology::OTHER_CDN, "ORG_LOC")
            .await
            .unwrap();
        assert_eq!(groups, vec![TestTopology::ORIGIN_OTHER]);
    }

    #[tokio::test]
    async fn swap_snapshot() {
        let store = MemoryStore::new(Snapshot::default());
        assert!(store
            .server_by_host_name("edge-1")
            .await
            .unwrap()
            .is_none());

        store.swap_snapshot(TestTopology::new().snapshot());
        assert!(store
            .server_by_host_name("edge-1")
            .await
            .unwrap()
            .is_some());
    }

    #[test]
    fn parse_yaml_snapshot() {
        let snapshot = Snapshot::from_yaml(
            r#"
cdns:
  - { id: 1, name: cdn1, domain_name: cdn1.example.com }
profiles:
  - { id: 10, name: EDGE_ATS }
parameters:
  - { id: 1, name: trafficserver, config_file: package, value: "7.1.2.el7" }
profile_parameters:
  - { profile: 10, parameter: 1 }
cache_groups:
  - { id: 100, name: edge-east, type_name: EDGE_LOC, parent_cache_group_id: 200 }
servers:
  - id: 1000
    host_name: edge-1
    cache_group_id: 100
    cdn_id: 1
    profile_id: 10
    type_name: EDGE
    status: REPORTED
"#,
        )
        .unwrap();

        assert_eq!(snapshot.servers[0].tcp_port, 80);
        assert_eq!(snapshot.cache_groups[0].parent_cache_group_id, Some(200));
        assert_eq!(snapshot.cache_groups[0].secondary_parent_cache_group_id, None);
        assert!(snapshot.delivery_services.is_empty());

        assert!(Snapshot::from_yaml("servers: 12").is_err());
    }
}
