use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::errors::UmbraError;
use crate::storage;
use crate::visibility::normalize;
use crate::visibility::types::PropertyAnnotations;
use crate::visibility::VisibilityConfig;

/// Source of the raw annotation values attached to a property.
///
/// The production implementation reads the annotation store; tests use an
/// in-memory map. The resolver treats a failing source as "no restriction
/// declared": an unreachable source degrades lookups, it never aborts a
/// render.
pub trait AnnotationSource {
    fn annotations(
        &self,
        property_key: &str,
    ) -> impl Future<Output = Result<PropertyAnnotations, UmbraError>> + Send;
}

/// Database-backed annotation source.
#[derive(Clone)]
pub struct AnnotationStore {
    db: DatabaseConnection,
}

impl AnnotationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl AnnotationSource for AnnotationStore {
    async fn annotations(&self, property_key: &str) -> Result<PropertyAnnotations, UmbraError> {
        Ok(storage::get_annotation(&self.db, property_key)
            .await?
            .unwrap_or_default())
    }
}

/// Resolves the visibility requirement attached to a property, with
/// per-session caching.
///
/// One resolver is created per render/query request and discarded
/// afterward, so its caches need no synchronization.
pub struct VisibilityResolver<A> {
    config: Arc<VisibilityConfig>,
    source: A,
    level_cache: HashMap<String, u32>,
    groups_cache: HashMap<String, Vec<String>>,
}

impl<A: AnnotationSource> VisibilityResolver<A> {
    pub fn new(config: Arc<VisibilityConfig>, source: A) -> Self {
        Self {
            config,
            source,
            level_cache: HashMap::new(),
            groups_cache: HashMap::new(),
        }
    }

    /// Required numeric rank for a property.
    ///
    /// Unknown properties, unrecognized level identifiers, and source
    /// failures all resolve to 0 (no restriction declared). The final
    /// access decision stays with the evaluator.
    pub async fn resolve_level(&mut self, property_key: &str) -> u32 {
        let key = normalize::normalize(property_key);
        if let Some(&rank) = self.level_cache.get(&key) {
            return rank;
        }

        let rank = match self.source.annotations(property_key).await {
            Ok(annotations) => annotations
                .level
                .as_deref()
                .map(|raw| self.rank_for_identifier(raw))
                .unwrap_or(0),
            Err(err) => {
                tracing::warn!(
                    property = property_key,
                    error = %err,
                    "annotation lookup failed; treating property as unrestricted"
                );
                0
            }
        };

        self.level_cache.insert(key, rank);
        rank
    }

    /// Explicit allow-list for a property, normalized and deduplicated.
    /// Empty means "no override, fall back to the numeric level".
    pub async fn resolve_allowed_groups(&mut self, property_key: &str) -> Vec<String> {
        let key = normalize::normalize(property_key);
        if let Some(groups) = self.groups_cache.get(&key) {
            return groups.clone();
        }

        let groups = match self.source.annotations(property_key).await {
            Ok(annotations) => {
                let mut out: Vec<String> = Vec::new();
                for raw in &annotations.visible_to {
                    let group = normalize::normalize(raw);
                    if !group.is_empty() && !out.contains(&group) {
                        out.push(group);
                    }
                }
                out
            }
            Err(err) => {
                tracing::warn!(
                    property = property_key,
                    error = %err,
                    "annotation lookup failed; treating property as unrestricted"
                );
                Vec::new()
            }
        };

        self.groups_cache.insert(key, groups.clone());
        groups
    }

    /// Try the identifier against every level name, then against every
    /// level reference; first match wins. Unrecognized identifiers resolve
    /// to 0.
    fn rank_for_identifier(&self, raw: &str) -> u32 {
        let wanted = normalize::normalize(raw);
        if wanted.is_empty() {
            return 0;
        }

        for level in self.config.all_levels() {
            if normalize::normalize(&level.name) == wanted {
                return level.rank;
            }
        }

        for level in self.config.all_levels() {
            if let Some(reference) = &level.reference {
                if normalize::normalize(reference) == wanted {
                    return level.rank;
                }
            }
        }

        tracing::debug!(
            identifier = raw,
            "level identifier matched no catalog entry; treating as unrestricted"
        );
        0
    }
}
