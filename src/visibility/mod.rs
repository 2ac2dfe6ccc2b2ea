pub mod errors;
pub mod evaluator;
pub mod loader;
pub mod normalize;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod web;

use std::collections::HashMap;
use types::LevelDef;

/// Fully compiled visibility configuration, loaded from the configuration
/// store at the start of an evaluation session. Immutable after
/// construction; administrative changes take effect on the next load.
#[derive(Debug)]
pub struct VisibilityConfig {
    /// All levels, ordered by rank ascending
    levels: Vec<LevelDef>,
    /// normalized level name -> index into `levels`
    by_name: HashMap<String, usize>,
    /// normalized group name -> name of its maximum permitted level
    group_max: HashMap<String, String>,
    /// set name -> member group names (expanded one level, never nested)
    group_sets: HashMap<String, Vec<String>>,
}

impl VisibilityConfig {
    /// Numeric rank for a level name. Absence is a normal outcome, never
    /// an error; callers treat it as "insufficient information, deny".
    pub fn level_rank(&self, name: &str) -> Option<u32> {
        let key = normalize::normalize(name);
        self.by_name.get(&key).map(|&idx| self.levels[idx].rank)
    }

    /// All levels ordered by rank ascending.
    pub fn all_levels(&self) -> &[LevelDef] {
        &self.levels
    }

    /// Name of the maximum level assigned to a group, if any.
    pub fn group_max_level(&self, group: &str) -> Option<&str> {
        self.group_max
            .get(&normalize::normalize(group))
            .map(String::as_str)
    }

    /// Member groups of a named group set, if the set exists.
    pub fn group_set(&self, set_name: &str) -> Option<&[String]> {
        self.group_sets.get(set_name.trim()).map(Vec::as_slice)
    }

    pub fn group_count(&self) -> usize {
        self.group_max.len()
    }
}
