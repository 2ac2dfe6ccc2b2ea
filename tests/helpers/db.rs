use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        // Connect to database
        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        // Run migrations
        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

/// Seed the level catalog and group assignments most scenarios build on
pub async fn seed_catalog(db: &DatabaseConnection) {
    for (name, rank, reference) in [
        ("public", 0u32, None),
        ("internal", 10, None),
        ("sensitive", 20, Some("Visibility:Sensitive")),
    ] {
        umbra::storage::create_level(db, name, rank, reference.map(str::to_string))
            .await
            .expect("Failed to create level");
    }

    for (group, level) in [
        ("*", "public"),
        ("user", "public"),
        ("lab_member", "internal"),
        ("pi", "sensitive"),
    ] {
        umbra::storage::set_group_max_level(db, group, level)
            .await
            .expect("Failed to assign group max level");
    }
}
