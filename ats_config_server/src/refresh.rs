// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::Path;
use std::time::{Duration, SystemTime};

use ats_config::store::{MemoryStore, Snapshot};

/// Read and parse a snapshot file. Files ending in `.json` are parsed as JSON, anything else as
/// YAML.
pub async fn read_snapshot(path: &str) -> Result<Snapshot, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| format!("Failed to read snapshot from {path}: {err}"))?;
    let is_json = Path::new(path)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    let snapshot = if is_json {
        Snapshot::from_json(&content)?
    } else {
        Snapshot::from_yaml(&content)?
    };
    log::info!(
        "Loaded snapshot from {path}: {} servers, {} delivery services, {} parameters",
        snapshot.servers.len(),
        snapshot.delivery_services.len(),
        snapshot.parameters.len()
    );
    Ok(snapshot)
}

pub async fn snapshot_modified(path: &str) -> Result<SystemTime, String> {
    tokio::fs::metadata(path)
        .await
        .and_then(|metadata| metadata.modified())
        .map_err(|err| format!("Failed to stat snapshot {path}: {err}"))
}

/// Reload the snapshot if the file changed since `last_modified`. Returns whether the store was
/// updated. On error the store keeps serving the previous snapshot.
pub async fn refresh_once(
    store: &MemoryStore,
    path: &str,
    last_modified: &mut SystemTime,
) -> Result<bool, String> {
    let modified = snapshot_modified(path).await?;
    if modified == *last_modified {
        return Ok(false);
    }
    let snapshot = read_snapshot(path).await?;
    store.swap_snapshot(snapshot);
    *last_modified = modified;
    Ok(true)
}

pub async fn refresh_snapshot(
    store: MemoryStore,
    path: String,
    refresh_frequency_s: u64,
    mut last_modified: SystemTime,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(refresh_frequency_s));
    loop {
        interval.tick().await;
        if let Err(e) = refresh_once(&store, &path, &mut last_modified).await {
            log_refresh_failure(e);
        }
    }
}

pub fn log_refresh_failure(e: String) {
    metrics::increment_counter!("ats_config_snapshot_refresh_failure");
    log::error!("Could not refresh snapshot, keeping the previous one. Error: {e}");
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::SystemTime;

    use ats_config::store::{MemoryStore, Snapshot};

    use super::{read_snapshot, refresh_once, snapshot_modified};

    const SNAPSHOT: &str = r#"
cdns:
  - { id: 1, name: cdn1 }
delivery_services:
  - { id: 1, xml_id: ds1, cdn_id: 1, type_name: HTTP }
"#;

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn reads_yaml_and_json() {
        let yaml = write_file(".yaml", SNAPSHOT);
        let snapshot = read_snapshot(yaml.path().to_str().unwrap()).await.unwrap();
        assert_eq!(snapshot.delivery_services[0].xml_id, "ds1");

        let json = write_file(".json", r#"{"cdns": [{"id": 1, "name": "cdn1"}]}"#);
        let snapshot = read_snapshot(json.path().to_str().unwrap()).await.unwrap();
        assert_eq!(snapshot.cdns[0].name, "cdn1");

        let err = read_snapshot("/nonexistent/snapshot.yaml").await.unwrap_err();
        assert!(err.starts_with("Failed to read snapshot"), "{err}");
    }

    #[tokio::test]
    async fn refresh_swaps_changed_snapshot() {
        let _ = env_logger::try_init();
        let file = write_file(".yaml", SNAPSHOT);
        let path = file.path().to_str().unwrap().to_owned();
        let store = MemoryStore::new(Snapshot::default());

        let mut last_modified = SystemTime::UNIX_EPOCH;
        assert!(refresh_once(&store, &path, &mut last_modified).await.unwrap());
        assert_eq!(store.snapshot().delivery_services.len(), 1);
        assert_eq!(last_modified, snapshot_modified(&path).await.unwrap());

        // Unchanged file is not reloaded.
        store.swap_snapshot(Snapshot::default());
        assert!(!refresh_once(&store, &path, &mut last_modified).await.unwrap());
        assert!(store.snapshot().delivery_services.is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let _ = env_logger::try_init();
        let file = write_file(".yaml", "servers: 12");
        let path = file.path().to_str().unwrap().to_owned();
        let store = MemoryStore::new(Snapshot::from_yaml(SNAPSHOT).unwrap());

        let mut last_modified = SystemTime::UNIX_EPOCH;
        let err = refresh_once(&store, &path, &mut last_modified)
            .await
            .unwrap_err();
        assert!(err.starts_with("snapshot parse error"), "{err}");
        assert_eq!(store.snapshot().delivery_services.len(), 1);
        assert_eq!(last_modified, SystemTime::UNIX_EPOCH);
    }
}
