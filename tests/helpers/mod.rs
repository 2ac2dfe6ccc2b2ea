pub mod builders;
pub mod db;

pub use builders::SubjectBuilder;
pub use db::{seed_catalog, TestDb};
