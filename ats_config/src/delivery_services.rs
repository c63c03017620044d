// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use crate::error::DerivationError;
use crate::model::{DeliveryService, Server};
use crate::store::TrafficOpsStore;
use crate::topology::Role;

/// Delivery services a server has to route for.
///
/// Origin-tier caches may see traffic for any delivery service of their CDN, so they get all of
/// them; edge caches only get the ones assigned to them. The order is the store's creation (or
/// assignment) order and is kept as-is so that regenerated files do not churn.
pub async fn delivery_services_for<S>(
    store: &S,
    server: &Server,
    role: Role,
) -> Result<Vec<DeliveryService>, DerivationError>
where
    S: TrafficOpsStore + Send + Sync + ?Sized,
{
    match role {
        Role::OriginTier => store
            .delivery_services_by_cdn(server.cdn_id)
            .await
            .map_err(DerivationError::store(
                "delivery services by cdn",
                server.cdn.clone(),
            )),
        Role::EdgeTier => store
            .delivery_services_by_server(server.id)
            .await
            .map_err(DerivationError::store(
                "delivery services by server",
                server.host_name.clone(),
            )),
    }
}
