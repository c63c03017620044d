// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use async_trait::async_trait;

use crate::model::{
    CacheGroup, CacheGroupId, CdnId, DeliveryService, ProfileId, Server, ServerId,
};
use crate::store::{StoreError, TrafficOpsStore};

/// Store that fails every query as if the database were unreachable.
pub struct AlwaysErrorsStore;

fn unavailable<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable(
        "This always will error!".to_string(),
    ))
}

#[async_trait]
impl TrafficOpsStore for AlwaysErrorsStore {
    async fn server_by_host_name(&self, _host_name: &str) -> Result<Option<Server>, StoreError> {
        unavailable()
    }

    async fn delivery_services_by_cdn(
        &self,
        _cdn_id: CdnId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        unavailable()
    }

    async fn delivery_services_by_server(
        &self,
        _server_id: ServerId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        unavailable()
    }

    async fn profile_parameter(
        &self,
        _profile_id: ProfileId,
        _config_file: &str,
        _name: &str,
    ) -> Result<Option<String>, StoreError> {
        unavailable()
    }

    async fn global_parameter(&self, _name: &str) -> Result<Option<String>, StoreError> {
        unavailable()
    }

    async fn cache_group(&self, _id: CacheGroupId) -> Result<Option<CacheGroup>, StoreError> {
        unavailable()
    }

    async fn cache_groups_by_type(
        &self,
        _cdn_id: CdnId,
        _type_name: &str,
    ) -> Result<Vec<CacheGroupId>, StoreError> {
        unavailable()
    }
}
