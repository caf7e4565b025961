//! Per-revision Cargo cache volumes
//!
//! Each revision gets its own named volume mounted over `CARGO_HOME`. Keying
//! by revision keeps concurrent builds of different revisions from fighting
//! over one registry cache, while repeated builds of the same revision start
//! warm.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Volume label keys used to track cache metadata
pub mod labels {
    /// Marks volume as a cwbuild cargo cache
    pub const CWBUILD_CACHE: &str = "io.cwbuild.cache";
    /// The revision the volume serves
    pub const REVISION: &str = "io.cwbuild.cache.revision";
    /// Creation timestamp (RFC3339)
    pub const CREATED_AT: &str = "io.cwbuild.cache.created_at";
}

/// A named volume holding Cargo's registry and git caches for one revision
#[derive(Debug, Clone)]
pub struct CacheVolume {
    /// Volume name (`{prefix}-{revision}`)
    pub name: String,
    /// Revision as given by the caller
    pub revision: String,
    pub created_at: DateTime<Utc>,
}

impl CacheVolume {
    pub fn new(prefix: &str, revision: &str) -> Self {
        Self {
            name: format!("{}-{}", prefix, volume_safe(revision)),
            revision: revision.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Labels for volume creation
    pub fn labels(&self) -> HashMap<String, String> {
        HashMap::from([
            (labels::CWBUILD_CACHE.to_string(), "true".to_string()),
            (labels::REVISION.to_string(), self.revision.clone()),
            (labels::CREATED_AT.to_string(), self.created_at.to_rfc3339()),
        ])
    }

    /// Try to parse from volume labels
    pub fn from_labels(name: &str, labels: &HashMap<String, String>) -> Option<Self> {
        if labels.get(labels::CWBUILD_CACHE).map(String::as_str) != Some("true") {
            return None;
        }

        let revision = labels.get(labels::REVISION)?.clone();

        let created_at = labels
            .get(labels::CREATED_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Some(Self {
            name: name.to_string(),
            revision,
            created_at,
        })
    }

    /// Check if this volume is older than the given number of days
    pub fn is_older_than_days(&self, days: u32) -> bool {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        self.created_at < cutoff
    }
}

/// Container engines accept `[a-zA-Z0-9][a-zA-Z0-9_.-]*` as volume names
pub(crate) fn volume_safe(revision: &str) -> String {
    revision
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
