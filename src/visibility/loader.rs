use std::collections::HashMap;

use sea_orm::DatabaseConnection;

use crate::settings::Settings;
use crate::storage;
use crate::visibility::errors::VisibilityError;
use crate::visibility::normalize;
use crate::visibility::types::LevelDef;
use crate::visibility::VisibilityConfig;

/// Load the full visibility configuration from the store and compile it
/// into an immutable snapshot for one evaluation session.
pub async fn load_snapshot(
    db: &DatabaseConnection,
    settings: &Settings,
) -> Result<VisibilityConfig, VisibilityError> {
    let levels = storage::list_levels(db).await?;
    let assignments = storage::list_group_levels(db).await?;

    let config = compile_snapshot(levels, assignments, settings.groups.sets.clone())?;

    tracing::debug!(
        levels = config.all_levels().len(),
        groups = config.group_count(),
        "Loaded visibility configuration snapshot"
    );

    Ok(config)
}

/// Validate and compile raw configuration rows into a `VisibilityConfig`.
///
/// Violations are configuration errors, fatal to session startup and
/// reported to the operator, never decision-time outcomes.
pub fn compile_snapshot(
    levels: Vec<storage::Level>,
    assignments: Vec<storage::GroupLevel>,
    group_sets: HashMap<String, Vec<String>>,
) -> Result<VisibilityConfig, VisibilityError> {
    let mut defs: Vec<LevelDef> = Vec::with_capacity(levels.len());
    for level in levels {
        let name = level.name.trim().to_string();
        if name.is_empty() {
            return Err(VisibilityError::InvalidConfig(
                "level names must be non-empty strings".into(),
            ));
        }
        let rank = u32::try_from(level.rank).map_err(|_| {
            VisibilityError::InvalidConfig(format!(
                "level `{name}` must map to a non-negative rank (got {})",
                level.rank
            ))
        })?;
        defs.push(LevelDef {
            id: level.id,
            name,
            rank,
            reference: level.reference,
        });
    }
    defs.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));

    let mut by_name = HashMap::new();
    for (idx, def) in defs.iter().enumerate() {
        let key = normalize::normalize(&def.name);
        if by_name.insert(key, idx).is_some() {
            return Err(VisibilityError::InvalidConfig(format!(
                "duplicate level name `{}` (names are compared in normalized form)",
                def.name
            )));
        }
    }

    let mut group_max = HashMap::new();
    for assignment in assignments {
        let group = normalize::normalize(&assignment.group_name);
        if group.is_empty() {
            return Err(VisibilityError::InvalidConfig(
                "group names must be non-empty strings".into(),
            ));
        }
        if !by_name.contains_key(&normalize::normalize(&assignment.level_name)) {
            return Err(VisibilityError::InvalidConfig(format!(
                "group `{}` references unknown level `{}`",
                assignment.group_name, assignment.level_name
            )));
        }
        group_max.insert(group, assignment.level_name);
    }

    for (set_name, members) in &group_sets {
        if set_name.trim().is_empty() {
            return Err(VisibilityError::InvalidConfig(
                "group set names must be non-empty strings".into(),
            ));
        }
        for member in members {
            if member.trim().is_empty() {
                return Err(VisibilityError::InvalidConfig(format!(
                    "group set `{set_name}` contains an empty group name"
                )));
            }
        }
    }

    Ok(VisibilityConfig {
        levels: defs,
        by_name,
        group_max,
        group_sets,
    })
}
