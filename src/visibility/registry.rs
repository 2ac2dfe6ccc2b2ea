use std::collections::HashMap;
use std::sync::Mutex;

use crate::visibility::normalize;

/// Render-session-keyed registry of declared property protections.
///
/// Populated while a render pass annotates its content, read back by
/// query-time filtering that cannot otherwise share a call stack with the
/// annotation pass. Entries under different session keys never interact.
/// There is no automatic eviction: the hosting renderer must call
/// [`reset`](Self::reset) when its render pass ends;
/// [`reset_all`](Self::reset_all) exists for test isolation only.
///
/// Property keys are normalized before storage and lookup so that two
/// spellings of the same property always collide to one entry.
#[derive(Debug, Default)]
pub struct PropertyPermissionRegistry {
    /// session key -> normalized property key -> required level names
    inner: Mutex<HashMap<String, HashMap<String, Vec<String>>>>,
}

impl PropertyPermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `property` requires `level` within one render session.
    /// Registering the same level twice is a no-op; empty property keys or
    /// level names are ignored.
    pub fn register(&self, session_key: &str, property: &str, level: &str) {
        let property = normalize::normalize(property);
        let level = level.trim();
        if property.is_empty() || level.is_empty() {
            return;
        }

        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let levels = inner
            .entry(session_key.to_string())
            .or_default()
            .entry(property)
            .or_default();
        if !levels.iter().any(|l| l == level) {
            levels.push(level.to_string());
        }
    }

    /// All level names declared for a property in one session.
    pub fn levels(&self, session_key: &str, property: &str) -> Vec<String> {
        let property = normalize::normalize(property);
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner
            .get(session_key)
            .and_then(|props| props.get(&property))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any protection was declared for a property in one session.
    pub fn is_protected(&self, session_key: &str, property: &str) -> bool {
        !self.levels(session_key, property).is_empty()
    }

    /// Drop one level requirement from a property; entries left empty are
    /// removed entirely.
    pub fn remove_level(&self, session_key: &str, property: &str, level: &str) {
        let property = normalize::normalize(property);
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if let Some(props) = inner.get_mut(session_key) {
            if let Some(levels) = props.get_mut(&property) {
                levels.retain(|l| l != level);
                if levels.is_empty() {
                    props.remove(&property);
                }
            }
        }
    }

    /// Drop a property and all its declared levels.
    pub fn remove_property(&self, session_key: &str, property: &str) {
        let property = normalize::normalize(property);
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if let Some(props) = inner.get_mut(session_key) {
            props.remove(&property);
        }
    }

    /// All properties with declared protections in one session.
    pub fn protected_properties(&self, session_key: &str) -> Vec<String> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        let mut properties: Vec<String> = inner
            .get(session_key)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default();
        properties.sort();
        properties
    }

    /// Discard all entries for one render session. The hosting renderer
    /// calls this at the end of its render pass.
    pub fn reset(&self, session_key: &str) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.remove(session_key);
    }

    /// Discard every session's entries. Test isolation only.
    pub fn reset_all(&self) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.clear();
    }
}
