use crate::constants;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A tenant boundary. Each Project owns exactly one namespace.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "core.gardener.cloud",
    version = "v1beta1",
    kind = "Project",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<ProjectMember>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<ProjectTolerations>,
}

/// An RBAC subject.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectMember {
    #[serde(flatten)]
    pub subject: Subject,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectTolerations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Vec<Toleration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<Toleration>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Toleration {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

// === impl Project ===

impl Project {
    /// The owner, falling back to the creator when no owner is set.
    pub fn effective_owner(&self) -> Option<&Subject> {
        self.spec.owner.as_ref().or(self.spec.created_by.as_ref())
    }

    pub fn members(&self) -> &[ProjectMember] {
        self.spec.members.as_deref().unwrap_or_default()
    }

    pub fn tolerations_whitelist(&self) -> &[Toleration] {
        self.spec
            .tolerations
            .as_ref()
            .and_then(|t| t.whitelist.as_deref())
            .unwrap_or_default()
    }
}

// === impl Subject ===

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            api_group: Some("rbac.authorization.k8s.io".to_string()),
            kind: constants::PROJECT_MEMBER_KIND_USER.to_string(),
            name: name.into(),
            namespace: None,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            api_group: Some("rbac.authorization.k8s.io".to_string()),
            kind: constants::PROJECT_MEMBER_KIND_GROUP.to_string(),
            name: name.into(),
            namespace: None,
        }
    }

    /// Returns true for users and groups, i.e. subjects that are not service accounts.
    pub fn is_human(&self) -> bool {
        match self.kind.as_str() {
            constants::PROJECT_MEMBER_KIND_USER => {
                !self.name.starts_with(constants::SERVICE_ACCOUNT_USER_PREFIX)
            }
            constants::PROJECT_MEMBER_KIND_GROUP => true,
            _ => false,
        }
    }

    /// Returns true if this subject is the user with the given name.
    pub fn is_user(&self, username: &str) -> bool {
        self.kind == constants::PROJECT_MEMBER_KIND_USER && self.name == username
    }
}

// === impl ProjectMember ===

impl ProjectMember {
    /// All roles of the member, sorted and deduplicated.
    pub fn all_roles(&self) -> Vec<String> {
        let mut roles = std::iter::once(self.role.clone())
            .chain(self.roles.iter().flatten().cloned())
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>();
        roles.sort();
        roles.dedup();
        roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_inline_member_subject() {
        let member: ProjectMember = serde_json::from_value(serde_json::json!({
            "apiGroup": "rbac.authorization.k8s.io",
            "kind": "User",
            "name": "alice@example.com",
            "role": "admin",
            "roles": ["viewer", "uam"],
        }))
        .unwrap();
        assert_eq!(member.subject, Subject::user("alice@example.com"));
        assert_eq!(member.all_roles(), vec!["admin", "uam", "viewer"]);
    }

    #[test]
    fn service_accounts_are_not_human() {
        assert!(Subject::user("alice").is_human());
        assert!(Subject::group("devs").is_human());
        assert!(!Subject::user("system:serviceaccount:garden-dev:robot").is_human());
        let sa = Subject {
            kind: "ServiceAccount".into(),
            name: "robot".into(),
            namespace: Some("garden-dev".into()),
            ..Default::default()
        };
        assert!(!sa.is_human());
    }
}
