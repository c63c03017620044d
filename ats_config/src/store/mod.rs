// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{
    CacheGroup, CacheGroupId, CdnId, DeliveryService, ProfileId, Server, ServerId,
};

mod always_errors;
mod error;
mod memory;
mod metrics;

pub use self::metrics::MetricsMonitoredStore;
pub use always_errors::AlwaysErrorsStore;
pub use error::StoreError;
pub use memory::{
    CdnRow, DeliveryServiceServerRow, MemoryStore, ProfileParameterRow, ProfileRow, ServerRow,
    Snapshot,
};

/// Alias for a shareable store trait object.
pub type ArcStore = Arc<dyn TrafficOpsStore + Send + Sync + 'static>;

/// Read-only queries against the relational model of a CDN.
///
/// Every method is a pure read. "No rows" is reported through `Option` / an empty `Vec`; an
/// `Err` always means the query itself failed.
#[async_trait]
pub trait TrafficOpsStore {
    /// Fetch the server with `host_name`, joined with its cache group, status, profile, CDN and
    /// type. Returns `None` when no such server exists.
    async fn server_by_host_name(&self, host_name: &str) -> Result<Option<Server>, StoreError>;

    /// All delivery services of a CDN, in creation order.
    async fn delivery_services_by_cdn(
        &self,
        cdn_id: CdnId,
    ) -> Result<Vec<DeliveryService>, StoreError>;

    /// Delivery services explicitly assigned to a server, in assignment order.
    async fn delivery_services_by_server(
        &self,
        server_id: ServerId,
    ) -> Result<Vec<DeliveryService>, StoreError>;

    /// Value of the parameter `(config_file, name)` bound to `profile_id`. When several
    /// parameters match, the one with the lowest id wins.
    async fn profile_parameter(
        &self,
        profile_id: ProfileId,
        config_file: &str,
        name: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Value of a parameter in the `global` config file scope, independent of any profile.
    async fn global_parameter(&self, name: &str) -> Result<Option<String>, StoreError>;

    async fn cache_group(&self, id: CacheGroupId) -> Result<Option<CacheGroup>, StoreError>;

    /// Ids of the cache groups of type `type_name` that hold servers of the CDN `cdn_id`.
    async fn cache_groups_by_type(
        &self,
        cdn_id: CdnId,
        type_name: &str,
    ) -> Result<Vec<CacheGroupId>, StoreError>;
}

#[async_trait]
impl<S> TrafficOpsStore for Box<S>
where
    S: TrafficOpsStore + Send + Sync + 'static + ?Sized,
{
    async fn server_by_host_name(&self, host_name: &str) -> Result<Option<Server>, StoreError> {
        (**self).server_by_host_name(host_name).await
    }

    async fn delivery_services_by_cdn(
        &self,
        cdn_id: CdnId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        (**self).delivery_services_by_cdn(cdn_id).await
    }

    async fn delivery_services_by_server(
        &self,
        server_id: ServerId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        (**self).delivery_services_by_server(server_id).await
    }

    async fn profile_parameter(
        &self,
        profile_id: ProfileId,
        config_file: &str,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        (**self)
            .profile_parameter(profile_id, config_file, name)
            .await
    }

    async fn global_parameter(&self, name: &str) -> Result<Option<String>, StoreError> {
        (**self).global_parameter(name).await
    }

    async fn cache_group(&self, id: CacheGroupId) -> Result<Option<CacheGroup>, StoreError> {
        (**self).cache_group(id).await
    }

    async fn cache_groups_by_type(
        &self,
        cdn_id: CdnId,
        type_name: &str,
    ) -> Result<Vec<CacheGroupId>, StoreError> {
        (**self).cache_groups_by_type(cdn_id, type_name).await
    }
}

#[async_trait]
impl<S> TrafficOpsStore for Arc<S>
where
    S: TrafficOpsStore + Send + Sync + 'static + ?Sized,
{
    async fn server_by_host_name(&self, host_name: &str) -> Result<Option<Server>, StoreError> {
        (**self).server_by_host_name(host_name).await
    }

    async fn delivery_services_by_cdn(
        &self,
        cdn_id: CdnId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        (**self).delivery_services_by_cdn(cdn_id).await
    }

    async fn delivery_services_by_server(
        &self,
        server_id: ServerId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        (**self).delivery_services_by_server(server_id).await
    }

    async fn profile_parameter(
        &self,
        profile_id: ProfileId,
        config_file: &str,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        (**self)
            .profile_parameter(profile_id, config_file, name)
            .await
    }

    async fn global_parameter(&self, name: &str) -> Result<Option<String>, StoreError> {
        (**self).global_parameter(name).await
    }

    async fn cache_group(&self, id: CacheGroupId) -> Result<Option<CacheGroup>, StoreError> {
        (**self).cache_group(id).await
    }

    async fn cache_groups_by_type(
        &self,
        cdn_id: CdnId,
        type_name: &str,
    ) -> Result<Vec<CacheGroupId>, StoreError> {
        (**self).cache_groups_by_type(cdn_id, type_name).await
    }
}
