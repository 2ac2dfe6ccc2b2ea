use std::collections::HashMap;
use std::sync::Arc;

use crate::visibility::errors::VisibilityError;
use crate::visibility::normalize;
use crate::visibility::resolver::{AnnotationSource, VisibilityResolver};
use crate::visibility::types::{Subject, VisibilityProfile};
use crate::visibility::VisibilityConfig;

/// Reserved group standing in for the anonymous/unauthenticated population.
pub const ANONYMOUS_GROUP: &str = "*";

/// Computes per-user visibility profiles and renders view decisions.
///
/// One evaluator is created per render/query request and discarded
/// afterward, so its profile cache needs no synchronization. Decision
/// precedence, in order:
///
///   1. A non-empty allow-list on the property decides the outcome
///      entirely; the numeric rank is not consulted.
///   2. Otherwise, allow iff the profile's max level >= the required rank.
///
/// A profile whose groups produced no level assignment at all denies every
/// rank, including 0. There is no default level for unassigned users.
pub struct PermissionEvaluator {
    config: Arc<VisibilityConfig>,
    profiles: HashMap<String, VisibilityProfile>,
}

impl PermissionEvaluator {
    pub fn new(config: Arc<VisibilityConfig>) -> Self {
        Self {
            config,
            profiles: HashMap::new(),
        }
    }

    /// Compute (or fetch from the session cache) a subject's profile.
    ///
    /// Group names are normalized and deduplicated, anonymous subjects
    /// always carry the `"*"` group, and the max level folds over every
    /// group assignment starting from "no assignment found".
    pub fn profile(&mut self, subject: &Subject) -> Result<VisibilityProfile, VisibilityError> {
        let cache_key = Self::cache_key(subject)?;
        if let Some(profile) = self.profiles.get(&cache_key) {
            return Ok(profile.clone());
        }

        let mut groups: Vec<String> = Vec::new();
        for raw in &subject.groups {
            let group = normalize::normalize(raw);
            if !group.is_empty() && !groups.contains(&group) {
                groups.push(group);
            }
        }
        if subject.is_anonymous() && !groups.iter().any(|g| g == ANONYMOUS_GROUP) {
            groups.push(ANONYMOUS_GROUP.to_string());
        }

        let mut max_level: Option<u32> = None;
        for group in &groups {
            let Some(level_name) = self.config.group_max_level(group) else {
                continue;
            };
            let Some(rank) = self.config.level_rank(level_name) else {
                continue;
            };
            if max_level.is_none_or(|current| rank > current) {
                max_level = Some(rank);
            }
        }

        tracing::debug!(
            subject = %subject.name,
            ?max_level,
            groups = ?groups,
            "resolved visibility profile"
        );

        let profile = VisibilityProfile { max_level, groups };
        self.profiles.insert(cache_key, profile.clone());
        Ok(profile)
    }

    /// Whether a profile may view content requiring `required_rank`,
    /// optionally restricted to `allowed_groups`. Never fails: every
    /// combination of missing data has a defined, deny-biased outcome.
    pub fn may_view(
        &self,
        profile: &VisibilityProfile,
        required_rank: u32,
        allowed_groups: &[String],
    ) -> bool {
        if !allowed_groups.is_empty() {
            return allowed_groups.iter().any(|group| profile.in_group(group));
        }

        match profile.max_level {
            Some(max) => max >= required_rank,
            None => false,
        }
    }

    /// Allow-list-only check used by group-based field protection; no
    /// numeric levels involved.
    ///
    /// Set names expand to their members exactly one level deep; unknown
    /// tokens pass through as literal group names. `"*"` anywhere in the
    /// expansion admits everyone, including anonymous users. An empty
    /// requirement admits no one.
    pub fn group_access(&self, profile: &VisibilityProfile, required_groups: &[String]) -> bool {
        let expanded = self.expand_group_sets(required_groups);
        if expanded.is_empty() {
            return false;
        }
        if expanded.iter().any(|group| group == ANONYMOUS_GROUP) {
            return true;
        }
        expanded.iter().any(|group| profile.in_group(group))
    }

    /// The single decision entry point for query/content filters: resolve
    /// the property's requirement and render the final verdict for the
    /// subject.
    pub async fn decide<A: AnnotationSource>(
        &mut self,
        resolver: &mut VisibilityResolver<A>,
        subject: &Subject,
        property_key: &str,
    ) -> Result<bool, VisibilityError> {
        let profile = self.profile(subject)?;
        let required_rank = resolver.resolve_level(property_key).await;
        let allowed_groups = resolver.resolve_allowed_groups(property_key).await;

        let allowed = self.may_view(&profile, required_rank, &allowed_groups);

        tracing::debug!(
            subject = %subject.name,
            property = property_key,
            required_rank,
            allowed_groups = ?allowed_groups,
            allowed,
            "visibility decision"
        );

        Ok(allowed)
    }

    fn expand_group_sets(&self, tokens: &[String]) -> Vec<String> {
        let mut expanded: Vec<String> = Vec::new();
        for token in tokens {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            if let Some(members) = self.config.group_set(token) {
                for member in members {
                    let group = normalize::normalize(member);
                    if !group.is_empty() && !expanded.contains(&group) {
                        expanded.push(group);
                    }
                }
                continue;
            }

            let group = normalize::normalize(token);
            if !group.is_empty() && !expanded.contains(&group) {
                expanded.push(group);
            }
        }
        expanded
    }

    /// Stable per-user cache key: registered-user id, or the normalized
    /// name for anonymous visitors. A subject with neither is a
    /// programming-contract violation, not a policy outcome.
    fn cache_key(subject: &Subject) -> Result<String, VisibilityError> {
        if let Some(id) = &subject.id {
            if !id.trim().is_empty() {
                return Ok(format!("id:{id}"));
            }
        }

        let name = normalize::normalize(&subject.name);
        if name.is_empty() {
            return Err(VisibilityError::InvalidSubject(
                "subject has neither a registered-user id nor a usable name".into(),
            ));
        }
        Ok(format!("name:{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GroupLevel, Level};
    use crate::visibility::loader::compile_snapshot;
    use std::collections::HashMap as StdHashMap;

    fn level(id: i32, name: &str, rank: i64) -> Level {
        Level {
            id,
            name: name.to_string(),
            rank,
            reference: None,
            updated_at: 0,
        }
    }

    fn assignment(group: &str, level_name: &str) -> GroupLevel {
        GroupLevel {
            group_name: group.to_string(),
            level_name: level_name.to_string(),
            updated_at: 0,
        }
    }

    fn make_config() -> Arc<VisibilityConfig> {
        let mut sets = StdHashMap::new();
        sets.insert(
            "all_admins".to_string(),
            vec!["sysop".to_string(), "pi".to_string()],
        );
        Arc::new(
            compile_snapshot(
                vec![
                    level(1, "public", 0),
                    level(2, "internal", 10),
                    level(3, "sensitive", 20),
                ],
                vec![
                    assignment("*", "public"),
                    assignment("user", "public"),
                    assignment("lab_member", "internal"),
                    assignment("pi", "sensitive"),
                ],
                sets,
            )
            .unwrap(),
        )
    }

    fn registered(name: &str, groups: &[&str]) -> Subject {
        Subject {
            id: Some(format!("uid-{name}")),
            name: name.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn anonymous(name: &str) -> Subject {
        Subject {
            id: None,
            name: name.to_string(),
            groups: vec![],
        }
    }

    #[test]
    fn test_profile_max_level_from_groups() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let profile = evaluator
            .profile(&registered("alice", &["user", "lab_member"]))
            .unwrap();
        assert_eq!(profile.max_level, Some(10));
        assert_eq!(profile.groups, vec!["user", "lab_member"]);
    }

    #[test]
    fn test_profile_normalizes_and_dedupes_groups() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let profile = evaluator
            .profile(&registered("alice", &["Group:PI", "pi", "Lab Member", ""]))
            .unwrap();
        assert_eq!(profile.groups, vec!["pi", "lab_member"]);
        assert_eq!(profile.max_level, Some(20));
    }

    #[test]
    fn test_profile_anonymous_gets_wildcard_group() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let profile = evaluator.profile(&anonymous("127.0.0.1")).unwrap();
        assert_eq!(profile.groups, vec!["*"]);
        assert_eq!(profile.max_level, Some(0));
    }

    #[test]
    fn test_profile_no_assignment_is_sentinel_not_zero() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        // "editors" has no level assignment and the subject is registered,
        // so no wildcard fallback applies either
        let profile = evaluator.profile(&registered("bob", &["editors"])).unwrap();
        assert_eq!(profile.max_level, None);
    }

    #[test]
    fn test_profile_cached_per_subject() {
        let mut evaluator = PermissionEvaluator::new(make_config());
        let subject = registered("alice", &["pi"]);

        let first = evaluator.profile(&subject).unwrap();
        let second = evaluator.profile(&subject).unwrap();
        assert_eq!(first, second);
        assert_eq!(evaluator.profiles.len(), 1);
    }

    #[test]
    fn test_profile_rejects_unidentifiable_subject() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let err = evaluator
            .profile(&Subject {
                id: None,
                name: "   ".to_string(),
                groups: vec!["pi".to_string()],
            })
            .unwrap_err();
        assert!(matches!(err, VisibilityError::InvalidSubject(_)));
    }

    #[test]
    fn test_may_view_numeric_ordering() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let high = evaluator.profile(&registered("alice", &["pi"])).unwrap();
        assert!(evaluator.may_view(&high, 0, &[]));
        assert!(evaluator.may_view(&high, 10, &[]));
        assert!(evaluator.may_view(&high, 20, &[]));

        let low = evaluator
            .profile(&registered("bob", &["lab_member"]))
            .unwrap();
        assert!(evaluator.may_view(&low, 10, &[]));
        assert!(!evaluator.may_view(&low, 20, &[]));
    }

    #[test]
    fn test_may_view_no_assignment_denies_even_public() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let profile = evaluator.profile(&registered("bob", &["editors"])).unwrap();
        assert!(!evaluator.may_view(&profile, 0, &[]));
        assert!(!evaluator.may_view(&profile, 10, &[]));
    }

    #[test]
    fn test_may_view_anonymous_public_only() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let profile = evaluator.profile(&anonymous("127.0.0.1")).unwrap();
        assert!(evaluator.may_view(&profile, 0, &[]));
        assert!(!evaluator.may_view(&profile, 10, &[]));
    }

    #[test]
    fn test_may_view_allow_list_overrides_numeric_rank() {
        let evaluator = PermissionEvaluator::new(make_config());

        // maxLevel 0 but matching the allow-list: allowed despite the rank
        let profile = VisibilityProfile {
            max_level: Some(0),
            groups: vec!["pi".to_string()],
        };
        assert!(evaluator.may_view(&profile, 20, &["pi".to_string()]));

        // maxLevel sufficient but not in the allow-list: denied
        let profile = VisibilityProfile {
            max_level: Some(20),
            groups: vec!["pi".to_string()],
        };
        assert!(!evaluator.may_view(&profile, 20, &["hr".to_string()]));
    }

    #[test]
    fn test_group_access_empty_requirement_denies() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let profile = evaluator.profile(&registered("alice", &["pi"])).unwrap();
        assert!(!evaluator.group_access(&profile, &[]));
        assert!(!evaluator.group_access(&profile, &["  ".to_string()]));
    }

    #[test]
    fn test_group_access_direct_and_set_expansion() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let profile = evaluator.profile(&registered("alice", &["pi"])).unwrap();
        assert!(evaluator.group_access(&profile, &["pi".to_string()]));
        // "all_admins" expands to sysop + pi
        assert!(evaluator.group_access(&profile, &["all_admins".to_string()]));

        let outsider = evaluator
            .profile(&registered("carol", &["editors"]))
            .unwrap();
        assert!(!evaluator.group_access(&outsider, &["all_admins".to_string()]));
    }

    #[test]
    fn test_group_access_unknown_token_passes_through() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let profile = evaluator
            .profile(&registered("carol", &["editors"]))
            .unwrap();
        // "editors" names no set, so it is treated as a literal group
        assert!(evaluator.group_access(&profile, &["editors".to_string()]));
    }

    #[test]
    fn test_group_access_wildcard_admits_everyone() {
        let mut evaluator = PermissionEvaluator::new(make_config());

        let anon = evaluator.profile(&anonymous("127.0.0.1")).unwrap();
        assert!(evaluator.group_access(&anon, &["*".to_string()]));

        let no_groups = evaluator.profile(&registered("dave", &[])).unwrap();
        assert!(evaluator.group_access(&no_groups, &["*".to_string()]));
    }

    #[test]
    fn test_cache_key_registered_vs_anonymous() {
        let by_id = PermissionEvaluator::cache_key(&registered("alice", &[])).unwrap();
        assert_eq!(by_id, "id:uid-alice");

        let by_name = PermissionEvaluator::cache_key(&anonymous("Visitor Joe")).unwrap();
        assert_eq!(by_name, "name:visitor_joe");
    }
}
