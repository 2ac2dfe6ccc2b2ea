use serde::{Deserialize, Serialize};

/// One named visibility level from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDef {
    pub id: i32,
    pub name: String,
    /// The sole ordering key; higher rank = more restrictive.
    pub rank: u32,
    /// Optional page-style reference ("Visibility:PI Only") that also
    /// identifies this level in annotations.
    pub reference: Option<String>,
}

/// Raw annotation values attached to one property, as returned by an
/// [`AnnotationSource`](crate::visibility::resolver::AnnotationSource).
/// Both fields are free-form author input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyAnnotations {
    pub level: Option<String>,
    #[serde(default)]
    pub visible_to: Vec<String>,
}

/// The acting user, as supplied by the hosting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    /// Stable registered-user id; `None` for anonymous visitors.
    #[serde(default)]
    pub id: Option<String>,
    /// Username, or a display handle for anonymous visitors.
    pub name: String,
    /// Raw group memberships, in whatever spelling the platform uses.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Subject {
    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }
}

/// A user's computed capability for one evaluation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityProfile {
    /// Highest rank any group assignment granted. `None` means no group
    /// produced an assignment at all, which denies every rank including 0
    /// and is distinct from an explicit assignment to a rank-0 level.
    pub max_level: Option<u32>,
    /// Normalized, deduplicated group names.
    pub groups: Vec<String>,
}

impl VisibilityProfile {
    /// Membership test against an already-normalized group name.
    pub fn in_group(&self, normalized: &str) -> bool {
        self.groups.iter().any(|g| g == normalized)
    }
}

// ---------- API request/response types ----------

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub subject: Subject,
    /// e.g. "Email" or "Property:Has salary"
    pub property: String,
}

#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckLevelRequest {
    pub subject: Subject,
    /// Level name, e.g. "internal"
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckGroupsRequest {
    pub subject: Subject,
    /// Group names or group-set names; entries may be comma-separated lists
    pub groups: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}
