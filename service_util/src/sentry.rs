// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::env;

use sentry::{types::Dsn, ClientInitGuard, ClientOptions};

use crate::infra::InfraConfig;

/// Environment variable naming the deployment environment reported to Sentry.
pub const ENVIRONMENT_VAR: &str = "ATS_CONFIG_ENVIRONMENT";

#[must_use = "Sentry client only operates if the init guard is kept alive."]
pub fn setup_sentry(
    config: Option<&InfraConfig>,
    service_name: &str,
) -> Result<Option<ClientInitGuard>, String> {
    let dsn = match config.and_then(|c| c.sentry_dsn.as_ref()) {
        Some(dsn) => dsn,
        None => {
            log::info!("Sentry DSN not configured; error reporting is disabled.");
            return Ok(None);
        }
    };
    let dsn: Dsn = dsn
        .parse()
        .map_err(|err| format!("Failed to parse Sentry DSN: {err}"))?;

    let guard = sentry::init(ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        environment: Some(
            env::var(ENVIRONMENT_VAR)
                .unwrap_or_else(|_| "local".to_owned())
                .into(),
        ),
        ..ClientOptions::default()
    });

    sentry::configure_scope(|scope| {
        scope.set_tag("service_name", service_name);
    });

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::setup_sentry;
    use crate::infra::InfraConfig;

    #[test]
    fn disabled_without_dsn() {
        assert!(setup_sentry(None, "test").unwrap().is_none());
        assert!(setup_sentry(Some(&InfraConfig::default()), "test")
            .unwrap()
            .is_none());
    }

    #[test]
    fn invalid_dsn_is_an_error() {
        let config = InfraConfig {
            sentry_dsn: Some("not a dsn".to_owned()),
            ..InfraConfig::default()
        };
        assert!(setup_sentry(Some(&config), "test").is_err());
    }
}
