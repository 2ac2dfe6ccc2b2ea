use crate::entities;
use crate::errors::UmbraError;
use crate::settings::Database as DbCfg;
use crate::visibility::normalize;
use crate::visibility::types::PropertyAnnotations;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub id: i32,
    pub name: String,
    pub rank: i64,
    pub reference: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupLevel {
    pub group_name: String,
    pub level_name: String,
    pub updated_at: i64,
}

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, UmbraError> {
    let db = Database::connect(&cfg.url).await?;
    Ok(db)
}

// Visibility level catalog

pub async fn list_levels(db: &DatabaseConnection) -> Result<Vec<Level>, UmbraError> {
    use entities::visibility_level::{Column, Entity};

    let models = Entity::find().order_by_asc(Column::Rank).all(db).await?;

    Ok(models.into_iter().map(level_from_model).collect())
}

pub async fn get_level_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<Level>, UmbraError> {
    // Names are compared on their normalized form so "PI Only" and
    // "pi_only" cannot coexist as distinct levels.
    let wanted = normalize::normalize(name);
    for level in list_levels(db).await? {
        if normalize::normalize(&level.name) == wanted {
            return Ok(Some(level));
        }
    }
    Ok(None)
}

pub async fn create_level(
    db: &DatabaseConnection,
    name: &str,
    rank: u32,
    reference: Option<String>,
) -> Result<Level, UmbraError> {
    let updated_at = Utc::now().timestamp();

    let level = entities::visibility_level::ActiveModel {
        id: Default::default(),
        name: Set(name.to_string()),
        rank: Set(i64::from(rank)),
        reference: Set(reference.clone()),
        updated_at: Set(updated_at),
    };

    let model = level.insert(db).await?;

    Ok(level_from_model(model))
}

pub async fn update_level(
    db: &DatabaseConnection,
    id: i32,
    name: &str,
    rank: u32,
    reference: Option<String>,
) -> Result<Level, UmbraError> {
    use entities::visibility_level::{Column, Entity};

    let model = Entity::find()
        .filter(Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| UmbraError::NotFound(format!("visibility level {id}")))?;

    let mut active: entities::visibility_level::ActiveModel = model.into();
    active.name = Set(name.to_string());
    active.rank = Set(i64::from(rank));
    active.reference = Set(reference);
    active.updated_at = Set(Utc::now().timestamp());

    let model = active.update(db).await?;

    Ok(level_from_model(model))
}

pub async fn delete_level(db: &DatabaseConnection, id: i32) -> Result<(), UmbraError> {
    use entities::visibility_level::{Column, Entity};

    Entity::delete_many()
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;

    Ok(())
}

fn level_from_model(model: entities::visibility_level::Model) -> Level {
    Level {
        id: model.id,
        name: model.name,
        rank: model.rank,
        reference: model.reference,
        updated_at: model.updated_at,
    }
}

// Group -> max level assignments

pub async fn list_group_levels(db: &DatabaseConnection) -> Result<Vec<GroupLevel>, UmbraError> {
    use entities::group_level::{Column, Entity};

    let models = Entity::find()
        .order_by_asc(Column::GroupName)
        .all(db)
        .await?;

    Ok(models
        .into_iter()
        .map(|m| GroupLevel {
            group_name: m.group_name,
            level_name: m.level_name,
            updated_at: m.updated_at,
        })
        .collect())
}

pub async fn set_group_max_level(
    db: &DatabaseConnection,
    group: &str,
    level_name: &str,
) -> Result<(), UmbraError> {
    use entities::group_level::{Column, Entity};
    use sea_orm::sea_query::OnConflict;

    let now = Utc::now().timestamp();

    let assignment = entities::group_level::ActiveModel {
        group_name: Set(group.to_string()),
        level_name: Set(level_name.to_string()),
        updated_at: Set(now),
    };

    Entity::insert(assignment)
        .on_conflict(
            OnConflict::column(Column::GroupName)
                .update_columns([Column::LevelName, Column::UpdatedAt])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

pub async fn remove_group_mapping(db: &DatabaseConnection, group: &str) -> Result<(), UmbraError> {
    use entities::group_level::{Column, Entity};

    Entity::delete_many()
        .filter(Column::GroupName.eq(group))
        .exec(db)
        .await?;

    Ok(())
}

// Property annotations
//
// Keys are normalized before storage and lookup so that different textual
// spellings of the same property collide to one row.

pub async fn get_annotation(
    db: &DatabaseConnection,
    property_key: &str,
) -> Result<Option<PropertyAnnotations>, UmbraError> {
    use entities::property_annotation::{Column, Entity};

    let key = normalize::normalize(property_key);

    if let Some(model) = Entity::find()
        .filter(Column::PropertyKey.eq(key))
        .one(db)
        .await?
    {
        let visible_to: Vec<String> = serde_json::from_str(&model.visible_to)?;
        Ok(Some(PropertyAnnotations {
            level: model.level,
            visible_to,
        }))
    } else {
        Ok(None)
    }
}

pub async fn set_annotation(
    db: &DatabaseConnection,
    property_key: &str,
    level: Option<&str>,
    visible_to: &[String],
) -> Result<(), UmbraError> {
    use entities::property_annotation::{Column, Entity};
    use sea_orm::sea_query::OnConflict;

    let now = Utc::now().timestamp();
    let visible_to_json = serde_json::to_string(visible_to)?;

    let annotation = entities::property_annotation::ActiveModel {
        property_key: Set(normalize::normalize(property_key)),
        level: Set(level.map(|l| l.to_string())),
        visible_to: Set(visible_to_json),
        updated_at: Set(now),
    };

    Entity::insert(annotation)
        .on_conflict(
            OnConflict::column(Column::PropertyKey)
                .update_columns([Column::Level, Column::VisibleTo, Column::UpdatedAt])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{Database, DatabaseConnection};
    use sea_orm_migration::MigratorTrait;
    use tempfile::NamedTempFile;

    /// Test database helper that keeps temp file alive
    struct TestDb {
        connection: DatabaseConnection,
        _temp_file: NamedTempFile,
    }

    impl TestDb {
        async fn new() -> Self {
            let temp_file = NamedTempFile::new().expect("Failed to create temp file");
            let db_path = temp_file.path().to_str().expect("Invalid temp file path");
            let db_url = format!("sqlite://{}?mode=rwc", db_path);

            let connection = Database::connect(&db_url)
                .await
                .expect("Failed to connect to test database");

            migration::Migrator::up(&connection, None)
                .await
                .expect("Failed to run migrations");

            Self {
                connection,
                _temp_file: temp_file,
            }
        }

        fn connection(&self) -> &DatabaseConnection {
            &self.connection
        }
    }

    #[tokio::test]
    async fn test_create_and_list_levels() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        create_level(db, "sensitive", 20, None)
            .await
            .expect("Failed to create level");
        create_level(db, "public", 0, None)
            .await
            .expect("Failed to create level");
        create_level(db, "internal", 10, Some("Visibility:Internal".to_string()))
            .await
            .expect("Failed to create level");

        let levels = list_levels(db).await.expect("Failed to list levels");

        // Ordered by rank ascending
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].name, "public");
        assert_eq!(levels[1].name, "internal");
        assert_eq!(levels[1].reference.as_deref(), Some("Visibility:Internal"));
        assert_eq!(levels[2].name, "sensitive");
        assert_eq!(levels[2].rank, 20);
    }

    #[tokio::test]
    async fn test_get_level_by_name_normalizes() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        create_level(db, "pi_only", 30, None)
            .await
            .expect("Failed to create level");

        let found = get_level_by_name(db, "PI Only")
            .await
            .expect("Query failed")
            .expect("Level not found");
        assert_eq!(found.name, "pi_only");

        let missing = get_level_by_name(db, "nonexistent")
            .await
            .expect("Query failed");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_level() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let level = create_level(db, "internal", 10, None)
            .await
            .expect("Failed to create level");

        let updated = update_level(db, level.id, "internal", 15, Some("Visibility:Internal".into()))
            .await
            .expect("Failed to update level");

        assert_eq!(updated.rank, 15);
        assert_eq!(updated.reference.as_deref(), Some("Visibility:Internal"));
    }

    #[tokio::test]
    async fn test_update_level_not_found() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let err = update_level(db, 999, "ghost", 5, None).await.unwrap_err();
        assert!(matches!(err, UmbraError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_level() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let level = create_level(db, "internal", 10, None)
            .await
            .expect("Failed to create level");

        delete_level(db, level.id).await.expect("Failed to delete");

        let levels = list_levels(db).await.expect("Failed to list levels");
        assert!(levels.is_empty());
    }

    #[tokio::test]
    async fn test_group_level_upsert() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        set_group_max_level(db, "pi", "internal")
            .await
            .expect("Failed to set group level");
        set_group_max_level(db, "pi", "sensitive")
            .await
            .expect("Failed to update group level");

        let mappings = list_group_levels(db).await.expect("Failed to list");
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].group_name, "pi");
        assert_eq!(mappings[0].level_name, "sensitive");
    }

    #[tokio::test]
    async fn test_remove_group_mapping() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        set_group_max_level(db, "pi", "sensitive")
            .await
            .expect("Failed to set group level");
        remove_group_mapping(db, "pi")
            .await
            .expect("Failed to remove mapping");

        let mappings = list_group_levels(db).await.expect("Failed to list");
        assert!(mappings.is_empty());
    }

    #[tokio::test]
    async fn test_annotation_roundtrip_and_upsert() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        set_annotation(db, "Email", Some("internal"), &[])
            .await
            .expect("Failed to set annotation");

        let ann = get_annotation(db, "Email")
            .await
            .expect("Query failed")
            .expect("Annotation not found");
        assert_eq!(ann.level.as_deref(), Some("internal"));
        assert!(ann.visible_to.is_empty());

        // Upsert replaces the previous annotation
        set_annotation(db, "Email", None, &["hr".to_string(), "pi".to_string()])
            .await
            .expect("Failed to update annotation");

        let ann = get_annotation(db, "Email")
            .await
            .expect("Query failed")
            .expect("Annotation not found");
        assert!(ann.level.is_none());
        assert_eq!(ann.visible_to, vec!["hr", "pi"]);
    }

    #[tokio::test]
    async fn test_annotation_key_spellings_collide() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        set_annotation(db, "Property:Has salary", Some("sensitive"), &[])
            .await
            .expect("Failed to set annotation");

        // A different spelling of the same property hits the same row
        let ann = get_annotation(db, "has_salary")
            .await
            .expect("Query failed")
            .expect("Annotation not found");
        assert_eq!(ann.level.as_deref(), Some("sensitive"));
    }

    #[tokio::test]
    async fn test_get_annotation_missing() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let result = get_annotation(db, "Unknown").await.expect("Query failed");
        assert!(result.is_none());
    }
}
