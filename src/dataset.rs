//! Sampled project records. The dataset file is a UTF-8 JSON array of
//! objects, produced by the (out-of-tree) sampler and consumed by the
//! ingest driver.

use std::path::Path;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingData {
    pub name: String,
    pub downloads: u64,
    pub git_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
}

/// Load a dataset file, optionally shuffling so that parallel ingest
/// runs do not all start on the same projects.
pub fn load(path: &Path, random_order: bool) -> std::io::Result<Vec<SamplingData>> {
    let raw = std::fs::read_to_string(path)?;
    let mut instances: Vec<SamplingData> =
        serde_json::from_str(&raw).map_err(std::io::Error::other)?;
    if random_order {
        instances.shuffle(&mut rand::thread_rng());
    }
    Ok(instances)
}

pub fn dump(path: &Path, instances: &[SamplingData]) -> std::io::Result<()> {
    let rendered = serde_json::to_string_pretty(instances).map_err(std::io::Error::other)?;
    std::fs::write(path, rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        let instances = vec![
            SamplingData {
                name: "flask".to_owned(),
                downloads: 1_000_000,
                git_source: "https://github.com/pallets/flask".to_owned(),
                git_revision: Some("deadbeef".to_owned()),
                license_type: Some("BSD-3-Clause".to_owned()),
            },
            SamplingData {
                name: "click".to_owned(),
                downloads: 900_000,
                git_source: "https://github.com/pallets/click".to_owned(),
                git_revision: None,
                license_type: None,
            },
        ];
        dump(&path, &instances).unwrap();
        let loaded = load(&path, false).unwrap();
        assert_eq!(loaded, instances);
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        std::fs::write(
            &path,
            r#"[{"name": "x", "downloads": 1, "git_source": "https://example.com/x"}]"#,
        )
        .unwrap();
        let loaded = load(&path, false).unwrap();
        assert_eq!(loaded[0].git_revision, None);
    }
}
