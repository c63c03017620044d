// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use crate::error::DerivationError;
use crate::model::ProfileId;
use crate::store::TrafficOpsStore;

/// Config file scope of parent-selection parameters.
pub const PARENT_CONFIG_SCOPE: &str = "parent.config";

/// Config file scope of parameters that are not bound to a specific config file.
pub const GLOBAL_SCOPE: &str = "global";

/// Config file scope of package versions.
pub const PACKAGE_SCOPE: &str = "package";

pub const TRAFFICSERVER_PACKAGE: &str = "trafficserver";

pub const TOOL_NAME_PARAMETER: &str = "tm.toolname";

pub const TOOL_URL_PARAMETER: &str = "tm.url";

/// Look up the value bound to `profile_id` under `(scope, name)`.
///
/// `Ok(None)` means the profile carries no such binding, which callers treat as "use the
/// default". Store failures are returned with the lookup key attached.
pub async fn lookup<S>(
    store: &S,
    profile_id: ProfileId,
    scope: &str,
    name: &'static str,
) -> Result<Option<String>, DerivationError>
where
    S: TrafficOpsStore + Send + Sync + ?Sized,
{
    store
        .profile_parameter(profile_id, scope, name)
        .await
        .map_err(DerivationError::store(
            name,
            format!("profile {profile_id}, config file {scope}"),
        ))
}

/// Name and base URL of the tool generating config files, as shown in file headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolIdentity {
    pub name: String,
    pub url: String,
}

/// Read the tool identity from the global parameters. Both parameters are required.
pub async fn tool_identity<S>(store: &S) -> Result<ToolIdentity, DerivationError>
where
    S: TrafficOpsStore + Send + Sync + ?Sized,
{
    let name = required_global(store, TOOL_NAME_PARAMETER).await?;
    let url = required_global(store, TOOL_URL_PARAMETER).await?;
    Ok(ToolIdentity { name, url })
}

async fn required_global<S>(store: &S, name: &'static str) -> Result<String, DerivationError>
where
    S: TrafficOpsStore + Send + Sync + ?Sized,
{
    store
        .global_parameter(name)
        .await
        .map_err(DerivationError::store(name, GLOBAL_SCOPE))?
        .ok_or_else(|| DerivationError::NotFound(format!("{GLOBAL_SCOPE} parameter {name}")))
}

#[cfg(test)]
mod tests {
    use super::{lookup, tool_identity, ToolIdentity, PARENT_CONFIG_SCOPE};
    use crate::error::DerivationError;
    use crate::store::{AlwaysErrorsStore, MemoryStore, StoreError};
    use crate::testutil::TestTopology;

    #[tokio::test]
    async fn lookup_present_and_absent() {
        let store = MemoryStore::new(TestTopology::new().snapshot());

        let value = lookup(
            &store,
            TestTopology::DS_PROFILE,
            PARENT_CONFIG_SCOPE,
            "psel.qstring_handling",
        )
        .await
        .unwrap();
        assert_eq!(value.as_deref(), Some("ignore"));

        let value = lookup(
            &store,
            TestTopology::BARE_PROFILE,
            PARENT_CONFIG_SCOPE,
            "psel.qstring_handling",
        )
        .await
        .unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn lookup_failure_carries_key() {
        let err = lookup(
            &AlwaysErrorsStore,
            7,
            PARENT_CONFIG_SCOPE,
            "mso.algorithm",
        )
        .await
        .unwrap_err();

        match err {
            DerivationError::Store {
                operation,
                key,
                source,
            } => {
                assert_eq!(operation, "mso.algorithm");
                assert_eq!(key, "profile 7, config file parent.config");
                assert!(matches!(source, StoreError::Unavailable(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_identity_is_required() {
        let mut topology = TestTopology::new();
        let store = MemoryStore::new(topology.snapshot());
        assert_eq!(
            tool_identity(&store).await.unwrap(),
            ToolIdentity {
                name: "Traffic Ops".to_owned(),
                url: "https://tm.example.com/".to_owned(),
            }
        );

        topology
            .snapshot_mut()
            .parameters
            .retain(|p| p.name != "tm.url");
        let store = MemoryStore::new(topology.snapshot());
        let err = tool_identity(&store).await.unwrap_err();
        assert_eq!(
            err,
            DerivationError::NotFound("global parameter tm.url".to_owned())
        );
    }
}
