// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};

use crate::model::{
    CacheGroup, CacheGroupId, CdnId, DeliveryService, ProfileId, Server, ServerId,
};
use crate::store::{StoreError, TrafficOpsStore};

const OK_LABEL: &str = "ok";
const ERR_LABEL: &str = "err";

/// A `TrafficOpsStore` that emits metrics for calls into an underlying store.
#[derive(Clone, Debug)]
pub struct MetricsMonitoredStore<S> {
    driver_label: &'static str,
    inner: S,
}

impl<S> MetricsMonitoredStore<S> {
    pub fn new(inner: S, driver_label: &'static str) -> Self {
        MetricsMonitoredStore {
            driver_label,
            inner,
        }
    }

    async fn observe<T, F>(&self, operation: &'static str, query: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let start_time = Instant::now();
        counter!(
            "ats_config_store_requests_started_total",
            1,
            "operation" => operation,
            "driver" => self.driver_label,
        );

        let result = query.await;

        let result_label = if result.is_ok() { OK_LABEL } else { ERR_LABEL };
        counter!(
            "ats_config_store_requests_handled_total",
            1,
            "operation" => operation,
            "driver" => self.driver_label,
            "result" => result_label,
        );
        histogram!(
            "ats_config_store_requests_handling_seconds",
            start_time.elapsed(),
            "operation" => operation,
            "driver" => self.driver_label,
            "result" => result_label,
        );

        result
    }
}

#[async_trait]
impl<S> TrafficOpsStore for MetricsMonitoredStore<S>
where
    S: TrafficOpsStore + Send + Sync + 'static,
{
    async fn server_by_host_name(&self, host_name: &str) -> Result<Option<Server>, StoreError> {
        self.observe(
            "server_by_host_name",
            self.inner.server_by_host_name(host_name),
        )
        .await
    }

    async fn delivery_services_by_cdn(
        &self,
        cdn_id: CdnId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        self.observe(
            "delivery_services_by_cdn",
            self.inner.delivery_services_by_cdn(cdn_id),
        )
        .await
    }

    async fn delivery_services_by_server(
        &self,
        server_id: ServerId,
    ) -> Result<Vec<DeliveryService>, StoreError> {
        self.observe(
            "delivery_services_by_server",
            self.inner.delivery_services_by_server(server_id),
        )
        .await
    }

    async fn profile_parameter(
        &self,
        profile_id: ProfileId,
        config_file: &str,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        self.observe(
            "profile_parameter",
            self.inner.profile_parameter(profile_id, config_file, name),
        )
        .await
    }

    async fn global_parameter(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.observe("global_parameter", self.inner.global_parameter(name))
            .await
    }

    async fn cache_group(&self, id: CacheGroupId) -> Result<Option<CacheGroup>, StoreError> {
        self.observe("cache_group", self.inner.cache_group(id)).await
    }

    async fn cache_groups_by_type(
        &self,
        cdn_id: CdnId,
        type_name: &str,
    ) -> Result<Vec<CacheGroupId>, StoreError> {
        self.observe(
            "cache_groups_by_type",
            self.inner.cache_groups_by_type(cdn_id, type_name),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::MetricsMonitoredStore;
    use crate::store::{AlwaysErrorsStore, MemoryStore, StoreError, TrafficOpsStore};
    use crate::testutil::TestTopology;

    #[tokio::test]
    async fn passes_results_through() {
        let store =
            MetricsMonitoredStore::new(MemoryStore::new(TestTopology::new().snapshot()), "memory");
        let server = store.server_by_host_name("mid-1").await.unwrap().unwrap();
        assert_eq!(server.type_name, "MID");

        let store = MetricsMonitoredStore::new(AlwaysErrorsStore, "always_errors");
        let err = store.global_parameter("tm.toolname").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
