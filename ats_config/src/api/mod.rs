// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::convert::Infallible;

use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::engine::ConfigEngine;
use crate::error::DerivationError;


/// Map a derivation failure to the HTTP status returned to clients.
pub fn status_for(err: &DerivationError) -> StatusCode {
    match err {
        DerivationError::NotFound(_) => StatusCode::NOT_FOUND,
        DerivationError::UnsupportedFileKind(_) => StatusCode::BAD_REQUEST,
        DerivationError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The `Server` exposes a `ConfigEngine` over the Traffic Ops config file routes.
#[derive(Clone)]
pub struct Server {
    engine: ConfigEngine,
}

impl Server {
    pub fn new(engine: ConfigEngine) -> Self {
        Server { engine }
    }

    /// Routes:
    ///
    /// * `GET /api/1.2/servers/{host}/configfiles/ats/{file}` returns the generated file.
    /// * `GET /api/1.2/servers/{host}/configfiles/ats` returns the server metadata as JSON.
    pub fn into_filter(self) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        let config_file = warp::path!(
            "api" / "1.2" / "servers" / String / "configfiles" / "ats" / String
        )
        .and(warp::get())
        .and(self.with_server())
        .and_then(|host_name: String, file_name: String, server: Server| async move {
            Ok::<_, Infallible>(server.config_file(host_name, file_name).await)
        });

        let metadata = warp::path!("api" / "1.2" / "servers" / String / "configfiles" / "ats")
            .and(warp::get())
            .and(self.with_server())
            .and_then(|host_name: String, server: Server| async move {
                Ok::<_, Infallible>(server.server_metadata(host_name).await)
            });

        config_file.or(metadata).unify()
    }

    fn with_server(&self) -> impl Filter<Extract = (Server,), Error = Infallible> + Clone {
        let server = self.clone();
        warp::any().map(move || server.clone())
    }

    #[tracing::instrument(skip_all, fields(opentelemetry = true))]
    async fn config_file(&self, host_name: String, file_name: String) -> Response {
        match self.engine.config_file(&host_name, &file_name).await {
            Ok(file) => warp::reply::with_header(file.body, "content-type", file.content_type)
                .into_response(),
            Err(err) => error_response(&host_name, &file_name, err),
        }
    }

    #[tracing::instrument(skip_all, fields(opentelemetry = true))]
    async fn server_metadata(&self, host_name: String) -> Response {
        match self.engine.server_metadata(&host_name).await {
            Ok(metadata) => warp::reply::json(&metadata).into_response(),
            Err(err) => error_response(&host_name, "metadata", err),
        }
    }
}

fn error_response(host_name: &str, what: &str, err: DerivationError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        log::error!("Failed to generate {what} for {host_name}: {err}");
    } else {
        log::debug!("Rejected {what} for {host_name}: {err}");
    }
    warp::reply::with_status(status.canonical_reason().unwrap_or_default(), status)
        .into_response()
}
