// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use futures::future::try_join_all;
use serde::Serialize;

use crate::error::DerivationError;
use crate::model::DeliveryService;
use crate::parameters::{lookup, PARENT_CONFIG_SCOPE};
use crate::store::TrafficOpsStore;

/// A parent-selection behaviour that a delivery service profile may override.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverrideField {
    QstringHandling,
    MsoAlgorithm,
    MsoParentRetry,
    MsoUnavailableServerRetryResponses,
    MsoMaxSimpleRetries,
    MsoMaxUnavailableServerRetries,
}

impl OverrideField {
    pub const ALL: [OverrideField; 6] = [
        OverrideField::QstringHandling,
        OverrideField::MsoAlgorithm,
        OverrideField::MsoParentRetry,
        OverrideField::MsoUnavailableServerRetryResponses,
        OverrideField::MsoMaxSimpleRetries,
        OverrideField::MsoMaxUnavailableServerRetries,
    ];

    /// Name of the `parent.config` parameter holding this override.
    pub fn parameter_name(&self) -> &'static str {
        match self {
            OverrideField::QstringHandling => "psel.qstring_handling",
            OverrideField::MsoAlgorithm => "mso.algorithm",
            OverrideField::MsoParentRetry => "mso.parent_retry",
            OverrideField::MsoUnavailableServerRetryResponses => {
                "mso.unavailable_server_retry_responses"
            }
            OverrideField::MsoMaxSimpleRetries => "mso.max_simple_retries",
            OverrideField::MsoMaxUnavailableServerRetries => "mso.max_unavailable_server_retries",
        }
    }
}

/// Overrides resolved for one delivery service. `None` means "not set, use the default".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OverrideSet {
    pub qstring_handling: Option<String>,
    pub mso_algorithm: Option<String>,
    pub mso_parent_retry: Option<String>,
    pub mso_unavailable_server_retry_responses: Option<String>,
    pub mso_max_simple_retries: Option<String>,
    pub mso_max_unavailable_server_retries: Option<String>,
}

impl OverrideSet {
    pub fn get(&self, field: OverrideField) -> Option<&str> {
        let value = match field {
            OverrideField::QstringHandling => &self.qstring_handling,
            OverrideField::MsoAlgorithm => &self.mso_algorithm,
            OverrideField::MsoParentRetry => &self.mso_parent_retry,
            OverrideField::MsoUnavailableServerRetryResponses => {
                &self.mso_unavailable_server_retry_responses
            }
            OverrideField::MsoMaxSimpleRetries => &self.mso_max_simple_retries,
            OverrideField::MsoMaxUnavailableServerRetries => {
                &self.mso_max_unavailable_server_retries
            }
        };
        value.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        OverrideField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// A delivery service together with its resolved overrides. Lives for one derivation only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDeliveryService {
    pub delivery_service: DeliveryService,
    pub overrides: OverrideSet,
}

/// Resolve the overrides of a delivery service from its profile.
///
/// Each field is looked up independently. A missing binding leaves the field unset; any store
/// failure fails the whole resolution.
pub async fn resolve<S>(
    store: &S,
    delivery_service: &DeliveryService,
) -> Result<OverrideSet, DerivationError>
where
    S: TrafficOpsStore + Send + Sync + ?Sized,
{
    let profile_id = match delivery_service.profile() {
        Some(id) => id,
        None => return Ok(OverrideSet::default()),
    };

    let field =
        |f: OverrideField| lookup(store, profile_id, PARENT_CONFIG_SCOPE, f.parameter_name());

    let (
        qstring_handling,
        mso_algorithm,
        mso_parent_retry,
        mso_unavailable_server_retry_responses,
        mso_max_simple_retries,
        mso_max_unavailable_server_retries,
    ) = futures::try_join!(
        field(OverrideField::QstringHandling),
        field(OverrideField::MsoAlgorithm),
        field(OverrideField::MsoParentRetry),
        field(OverrideField::MsoUnavailableServerRetryResponses),
        field(OverrideField::MsoMaxSimpleRetries),
        field(OverrideField::MsoMaxUnavailableServerRetries),
    )?;

    Ok(OverrideSet {
        qstring_handling,
        mso_algorithm,
        mso_parent_retry,
        mso_unavailable_server_retry_responses,
        mso_max_simple_retries,
        mso_max_unavailable_server_retries,
    })
}

/// Resolve every delivery service, keeping the input order.
pub async fn resolve_all<S>(
    store: &S,
    delivery_services: Vec<DeliveryService>,
) -> Result<Vec<ResolvedDeliveryService>, DerivationError>
where
    S: TrafficOpsStore + Send + Sync + ?Sized,
{
    try_join_all(delivery_services.into_iter().map(|ds| async move {
        let overrides = resolve(store, &ds).await?;
        Ok::<_, DerivationError>(ResolvedDeliveryService {
            delivery_service: ds,
            overrides,
        })
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::{resolve, resolve_all, OverrideField, OverrideSet};
    use crate::error::DerivationError;
    use crate::model::DeliveryService;
    use crate::store::MemoryStore;
    use crate::testutil::{FailingParameterStore, TestTopology};

    fn delivery_service(store: &MemoryStore, id: i64) -> DeliveryService {
        store
            .snapshot()
            .delivery_services
            .iter()
            .find(|ds| ds.id == id)
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn no_profile_means_all_defaults() {
        let store = MemoryStore::new(TestTopology::new().snapshot());
        let ds = delivery_service(&store, TestTopology::DS_3);
        assert_eq!(ds.profile_id, None);

        let overrides = resolve(&store, &ds).await.unwrap();
        assert_eq!(overrides, OverrideSet::default());
        assert!(overrides.is_empty());

        // A profile id of zero behaves the same, and is never queried.
        let mut ds = ds;
        ds.profile_id = Some(0);
        let failing = FailingParameterStore::new(store.clone(), "psel.qstring_handling");
        assert!(resolve(&failing, &ds).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn each_field_uses_its_own_parameter() {
        let store = MemoryStore::new(TestTopology::new().snapshot());
        let ds = delivery_service(&store, TestTopology::DS_1);

        let overrides = resolve(&store, &ds).await.unwrap();
        assert_eq!(
            overrides,
            OverrideSet {
                qstring_handling: Some("ignore".to_owned()),
                mso_algorithm: Some("consistent_hash".to_owned()),
                mso_parent_retry: Some("both".to_owned()),
                mso_unavailable_server_retry_responses: Some("\"500,502,503\"".to_owned()),
                mso_max_simple_retries: Some("2".to_owned()),
                mso_max_unavailable_server_retries: Some("1".to_owned()),
            }
        );
    }

    #[tokio::test]
    async fn profile_without_bindings_resolves_to_defaults() {
        let store = MemoryStore::new(TestTopology::new().snapshot());
        let ds = delivery_service(&store, TestTopology::DS_2);
        assert_eq!(ds.profile_id, Some(TestTopology::BARE_PROFILE));

        assert!(resolve(&store, &ds).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_bindings() {
        let mut topology = TestTopology::new();
        topology.bind_parameter(
            TestTopology::BARE_PROFILE,
            500,
            "parent.config",
            "mso.parent_retry",
            "simple_retry",
        );
        let store = MemoryStore::new(topology.snapshot());
        let ds = delivery_service(&store, TestTopology::DS_2);

        let overrides = resolve(&store, &ds).await.unwrap();
        for field in OverrideField::ALL {
            if field == OverrideField::MsoParentRetry {
                assert_eq!(overrides.get(field), Some("simple_retry"));
            } else {
                assert_eq!(overrides.get(field), None, "{field:?}");
            }
        }
    }

    #[tokio::test]
    async fn store_failure_fails_resolution() {
        let store = MemoryStore::new(TestTopology::new().snapshot());
        let ds = delivery_service(&store, TestTopology::DS_1);

        for field in OverrideField::ALL {
            let failing = FailingParameterStore::new(store.clone(), field.parameter_name());
            let err = resolve(&failing, &ds).await.unwrap_err();
            match err {
                DerivationError::Store { operation, .. } => {
                    assert_eq!(operation, field.parameter_name())
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn resolve_all_keeps_order() {
        let store = MemoryStore::new(TestTopology::new().snapshot());
        let services = vec![
            delivery_service(&store, TestTopology::DS_3),
            delivery_service(&store, TestTopology::DS_1),
            delivery_service(&store, TestTopology::DS_2),
        ];

        let resolved = resolve_all(&store, services).await.unwrap();
        let xml_ids: Vec<_> = resolved
            .iter()
            .map(|r| r.delivery_service.xml_id.as_str())
            .collect();
        assert_eq!(xml_ids, vec!["ds3", "ds1", "ds2"]);
        assert_eq!(
            resolved[1].overrides.qstring_handling.as_deref(),
            Some("ignore")
        );
    }
}
