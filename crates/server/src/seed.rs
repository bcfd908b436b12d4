// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loading YAML manifests into the embedded store at startup.
//!
//! Each file holds one object with a `kind` field naming the stored kind.

use std::path::Path;

use anvil_core::{Hardware, Pipeline, Workflow};
use anvil_store::{ObjectStore, StoreError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: unknown kind {kind:?} (expected Hardware, Workflow, or Pipeline)")]
    UnknownKind { path: String, kind: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The store surface seeding needs.
pub trait SeedStore:
    ObjectStore<Hardware> + ObjectStore<Workflow> + ObjectStore<Pipeline>
{
}

impl<T> SeedStore for T where
    T: ObjectStore<Hardware> + ObjectStore<Workflow> + ObjectStore<Pipeline>
{
}

/// Load every `.yaml`/`.yml` manifest under `dir`. Returns how many objects
/// were created.
pub async fn load_dir<S: SeedStore>(store: &S, dir: &Path) -> Result<usize, SeedError> {
    let read_dir = std::fs::read_dir(dir).map_err(|source| SeedError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut paths: Vec<_> = read_dir
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml" | "yml")
            )
        })
        .collect();
    paths.sort();

    let mut loaded = 0;
    for path in paths {
        let text = std::fs::read_to_string(&path).map_err(|source| SeedError::Io {
            path: path.display().to_string(),
            source,
        })?;
        load_manifest(store, &path, &text).await?;
        loaded += 1;
    }
    Ok(loaded)
}

async fn load_manifest<S: SeedStore>(
    store: &S,
    path: &Path,
    text: &str,
) -> Result<(), SeedError> {
    let yaml_err = |source| SeedError::Yaml {
        path: path.display().to_string(),
        source,
    };

    let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(yaml_err)?;
    let kind = value
        .get("kind")
        .and_then(|k| k.as_str())
        .unwrap_or_default()
        .to_string();

    match kind.as_str() {
        "Hardware" => {
            let object: Hardware = serde_yaml::from_value(value).map_err(yaml_err)?;
            info!(path = %path.display(), name = %object.metadata.name, "seeding hardware");
            store.create(object).await?;
        }
        "Workflow" => {
            let object: Workflow = serde_yaml::from_value(value).map_err(yaml_err)?;
            info!(path = %path.display(), name = %object.metadata.name, "seeding workflow");
            store.create(object).await?;
        }
        "Pipeline" => {
            let object: Pipeline = serde_yaml::from_value(value).map_err(yaml_err)?;
            info!(path = %path.display(), name = %object.metadata.name, "seeding pipeline");
            store.create(object).await?;
        }
        other => {
            return Err(SeedError::UnknownKind {
                path: path.display().to_string(),
                kind: other.to_string(),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "seed_tests.rs"]
mod tests;
