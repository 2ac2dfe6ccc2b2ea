use umbra::visibility::types::Subject;

/// Builder for test subjects
pub struct SubjectBuilder {
    id: Option<String>,
    name: String,
    groups: Vec<String>,
}

impl SubjectBuilder {
    /// A registered user with a stable id derived from the name
    pub fn registered(name: &str) -> Self {
        Self {
            id: Some(format!("uid-{name}")),
            name: name.to_string(),
            groups: Vec::new(),
        }
    }

    /// An anonymous visitor identified only by a display handle
    pub fn anonymous(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            groups: Vec::new(),
        }
    }

    pub fn group(mut self, group: &str) -> Self {
        self.groups.push(group.to_string());
        self
    }

    pub fn build(self) -> Subject {
        Subject {
            id: self.id,
            name: self.name,
            groups: self.groups,
        }
    }
}
