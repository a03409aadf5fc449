//! Authorizes changes to sensitive field groups with dedicated verbs.
//!
//! The verbs are checked in addition to the regular `update` permission, so that e.g. a project
//! member may be allowed to edit a Project but not to widen its tolerations whitelist.

use crate::WaitFor;
use garden_admission_controller_core::{
    authorizer, AuthorizationAttributes, Attributes, Error, Kind, Operation, Plugin, ReadyGate,
    Registration, SharedAuthorizer, Validate,
};
use garden_admission_controller_k8s_api::{
    garden::{self, project::Toleration, NamespacedCloudProfileSpec, Subject},
    CloudProfile, NamespacedCloudProfile, Project,
};
use garden_admission_controller_k8s_index::{Cache, Caches};
use std::collections::BTreeSet;
use tracing::debug;

pub const NAME: &str = "CustomVerbAuthorizer";

pub const VERB_MODIFY_TOLERATIONS_WHITELIST: &str = "modify-spec-tolerations-whitelist";
pub const VERB_MANAGE_MEMBERS: &str = "manage-members";
pub const VERB_MODIFY_KUBERNETES: &str = "modify-spec-kubernetes";
pub const VERB_MODIFY_MACHINE_IMAGES: &str = "modify-spec-machineimages";
pub const VERB_MODIFY_PROVIDER_CONFIG: &str = "modify-spec-providerconfig";
pub const VERB_RAISE_LIMITS: &str = "raise-spec-limits";

pub struct CustomVerbAuthorizer {
    gate: ReadyGate,
    cloud_profiles: Cache<CloudProfile>,
    authorizer: SharedAuthorizer,
}

/// A member as compared across updates: kind, name and sorted roles.
type MemberKey = (String, String, Vec<String>);

// === impl CustomVerbAuthorizer ===

impl CustomVerbAuthorizer {
    pub fn new(gate: ReadyGate, caches: &Caches, authorizer: SharedAuthorizer) -> Self {
        Self {
            gate: gate.wait_for(&caches.cloud_profiles),
            cloud_profiles: caches.cloud_profiles.clone(),
            authorizer,
        }
    }

    async fn require(
        &self,
        attrs: &Attributes,
        verbs: Vec<&'static str>,
        resource: &str,
    ) -> Result<(), Error> {
        for verb in verbs {
            debug!(%verb, kind = attrs.kind.as_str(), name = %attrs.name, "Checking custom verb");
            let request = AuthorizationAttributes::new(&attrs.user, verb)
                .resource(garden::GROUP, resource)
                .object(&attrs.namespace, &attrs.name);
            authorizer::require(&*self.authorizer, &request).await?;
        }
        Ok(())
    }

    async fn validate_project(&self, attrs: &Attributes) -> Result<(), Error> {
        if attrs.operation != Operation::Update {
            return Ok(());
        }
        let project = attrs.object::<Project>()?;
        let old = attrs.require_old_object::<Project>()?;

        let mut verbs = Vec::new();
        if tolerations_whitelist_changed(old, project) {
            verbs.push(VERB_MODIFY_TOLERATIONS_WHITELIST);
        }
        if must_check_members(old, project, &attrs.user.name) {
            verbs.push(VERB_MANAGE_MEMBERS);
        }
        self.require(attrs, verbs, "projects").await
    }

    async fn validate_namespaced_profile(&self, attrs: &Attributes) -> Result<(), Error> {
        let profile = attrs.object::<NamespacedCloudProfile>()?;
        let empty = NamespacedCloudProfileSpec::default();
        let old = match attrs.old_object::<NamespacedCloudProfile>()? {
            Some(old) => &old.spec,
            None => &empty,
        };
        let new = &profile.spec;

        let mut verbs = Vec::new();
        if old.kubernetes != new.kubernetes {
            verbs.push(VERB_MODIFY_KUBERNETES);
        }
        if old.machine_images != new.machine_images {
            verbs.push(VERB_MODIFY_MACHINE_IMAGES);
        }
        if old.provider_config != new.provider_config {
            verbs.push(VERB_MODIFY_PROVIDER_CONFIG);
        }
        if self.limits_raised(old, new)? {
            verbs.push(VERB_RAISE_LIMITS);
        }
        self.require(attrs, verbs, "namespacedcloudprofiles").await
    }

    /// Returns true if the node limit is set, changed and exceeds the parent's limit.
    fn limits_raised(
        &self,
        old: &NamespacedCloudProfileSpec,
        new: &NamespacedCloudProfileSpec,
    ) -> Result<bool, Error> {
        let max_nodes = |spec: &NamespacedCloudProfileSpec| {
            spec.limits.as_ref().and_then(|l| l.max_nodes_total)
        };
        let Some(requested) = max_nodes(new) else {
            return Ok(false);
        };
        if max_nodes(old) == Some(requested) {
            return Ok(false);
        }

        let parent = self
            .cloud_profiles
            .get_cluster(&new.parent.name)
            .ok_or_else(|| {
                Error::invalid_field(
                    "spec.parent.name",
                    format_args!("CloudProfile {} not found", new.parent.name),
                )
            })?;
        let parent_limit = parent.spec.limits.as_ref().and_then(|l| l.max_nodes_total);
        Ok(parent_limit.is_some_and(|limit| requested > limit))
    }
}

impl Plugin for CustomVerbAuthorizer {
    fn registration(&self) -> Registration {
        Registration::new(
            NAME,
            &[Kind::Project, Kind::NamespacedCloudProfile],
            &[Operation::Create, Operation::Update],
        )
    }

    fn ready_gate(&self) -> &ReadyGate {
        &self.gate
    }
}

#[async_trait::async_trait]
impl Validate for CustomVerbAuthorizer {
    async fn validate(&self, attrs: &Attributes) -> Result<(), Error> {
        match attrs.kind {
            Kind::Project => self.validate_project(attrs).await,
            Kind::NamespacedCloudProfile => self.validate_namespaced_profile(attrs).await,
            _ => Ok(()),
        }
    }
}

fn tolerations_whitelist_changed(old: &Project, new: &Project) -> bool {
    fn set(p: &Project) -> BTreeSet<&Toleration> {
        p.tolerations_whitelist().iter().collect()
    }
    set(old) != set(new)
}

/// Returns true if the human members other than the owner changed and the requester is not
/// the owner.
fn must_check_members(old: &Project, new: &Project, requester: &str) -> bool {
    let Some(owner) = new.effective_owner() else {
        return false;
    };
    if owner.is_user(requester) {
        return false;
    }
    human_members(old, owner) != human_members(new, owner)
}

fn human_members(project: &Project, owner: &Subject) -> BTreeSet<MemberKey> {
    project
        .members()
        .iter()
        .filter(|m| m.subject.is_human())
        .filter(|m| !(m.subject.kind == owner.kind && m.subject.name == owner.name))
        .map(|m| (m.subject.kind.clone(), m.subject.name.clone(), m.all_roles()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use garden_admission_controller_k8s_api::garden::{
        cloud_profile::{ExpirableVersion, KubernetesSettings, Limits},
        project::ProjectTolerations,
        ProjectMember,
    };
    use std::sync::Arc;

    fn authorizer(authz: &Arc<RecordingAuthorizer>) -> CustomVerbAuthorizer {
        let mut parent = mk_cloud_profile("aws");
        parent.spec.limits = Some(Limits {
            max_nodes_total: Some(100),
        });
        let caches = Caches {
            cloud_profiles: Cache::synced_with([parent]),
            ..Default::default()
        };
        CustomVerbAuthorizer::new(ReadyGate::default(), &caches, authz.clone())
    }

    fn member(subject: Subject, role: &str) -> ProjectMember {
        ProjectMember {
            subject,
            role: role.into(),
            roles: None,
        }
    }

    fn owned_project(members: Vec<ProjectMember>) -> Project {
        let mut project = mk_project("dev", "garden-dev");
        project.spec.owner = Some(Subject::user("owner"));
        project.spec.members = Some(members);
        project
    }

    async fn update_project(
        authz: &Arc<RecordingAuthorizer>,
        user: &str,
        old: Project,
        new: Project,
    ) -> Result<(), Error> {
        let attrs = Attributes::new(Operation::Update, new, mk_user(user)).with_old_object(old);
        authorizer(authz).validate(&attrs).await
    }

    #[tokio::test]
    async fn tolerations_whitelist_changes_require_the_verb() {
        let authz = Arc::new(RecordingAuthorizer::allow());
        let old = owned_project(vec![]);
        let mut new = old.clone();
        new.spec.tolerations = Some(ProjectTolerations {
            defaults: None,
            whitelist: Some(vec![Toleration {
                key: "dedicated".into(),
                value: None,
            }]),
        });
        update_project(&authz, "alice", old, new).await.unwrap();

        let calls = authz.calls();
        assert_eq!(authz.verbs(), vec![VERB_MODIFY_TOLERATIONS_WHITELIST]);
        assert_eq!(calls[0].group, "core.gardener.cloud");
        assert_eq!(calls[0].resource, "projects");
        assert_eq!(calls[0].name, "dev");
    }

    #[test]
    fn whitelist_comparison_ignores_order() {
        let toleration = |key: &str| Toleration {
            key: key.into(),
            value: None,
        };
        let with_whitelist = |keys: &[&str]| {
            let mut project = owned_project(vec![]);
            project.spec.tolerations = Some(ProjectTolerations {
                defaults: None,
                whitelist: Some(keys.iter().map(|k| toleration(k)).collect()),
            });
            project
        };

        let old = with_whitelist(&["a", "b"]);
        assert!(!tolerations_whitelist_changed(&old, &with_whitelist(&["b", "a"])));
        assert!(tolerations_whitelist_changed(&old, &with_whitelist(&["a"])));
        assert!(tolerations_whitelist_changed(&old, &owned_project(vec![])));
    }

    #[tokio::test]
    async fn reordering_members_is_not_a_change() {
        let authz = Arc::new(RecordingAuthorizer::deny(VERB_MANAGE_MEMBERS, "dev"));
        let a = member(Subject::user("alice"), "admin");
        let b = member(Subject::group("devs"), "viewer");
        let old = owned_project(vec![a.clone(), b.clone()]);
        let new = owned_project(vec![b, a]);
        update_project(&authz, "alice", old, new).await.unwrap();
        assert!(authz.calls().is_empty());
    }

    #[tokio::test]
    async fn adding_a_member_requires_the_verb() {
        let authz = Arc::new(RecordingAuthorizer::deny(VERB_MANAGE_MEMBERS, "dev"));
        let old = owned_project(vec![member(Subject::user("alice"), "admin")]);
        let new = owned_project(vec![
            member(Subject::user("alice"), "admin"),
            member(Subject::user("mallory"), "admin"),
        ]);
        let err = update_project(&authz, "alice", old, new).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(authz.verbs(), vec![VERB_MANAGE_MEMBERS]);
    }

    #[tokio::test]
    async fn changing_roles_requires_the_verb() {
        let authz = Arc::new(RecordingAuthorizer::allow());
        let old = owned_project(vec![member(Subject::user("alice"), "viewer")]);
        let new = owned_project(vec![member(Subject::user("alice"), "admin")]);
        update_project(&authz, "alice", old, new).await.unwrap();
        assert_eq!(authz.verbs(), vec![VERB_MANAGE_MEMBERS]);
    }

    #[tokio::test]
    async fn owners_manage_members_freely() {
        let authz = Arc::new(RecordingAuthorizer::deny(VERB_MANAGE_MEMBERS, "dev"));
        let old = owned_project(vec![]);
        let new = owned_project(vec![member(Subject::user("bob"), "admin")]);
        update_project(&authz, "owner", old, new).await.unwrap();
        assert!(authz.calls().is_empty());

        let mut old = mk_project("dev", "garden-dev");
        old.spec.members = Some(vec![]);
        let mut new = old.clone();
        new.spec.members = Some(vec![member(Subject::user("bob"), "admin")]);
        update_project(&authz, "alice", old, new).await.unwrap();
        assert!(authz.calls().is_empty(), "projects without an owner skip the check");
    }

    #[tokio::test]
    async fn owner_and_service_accounts_are_not_compared() {
        let authz = Arc::new(RecordingAuthorizer::deny(VERB_MANAGE_MEMBERS, "dev"));
        let old = owned_project(vec![]);
        let new = owned_project(vec![
            member(Subject::user("owner"), "admin"),
            member(Subject::user("system:serviceaccount:garden-dev:robot"), "admin"),
        ]);
        update_project(&authz, "alice", old, new).await.unwrap();
        assert!(authz.calls().is_empty());
    }

    fn mk_namespaced_profile(spec: NamespacedCloudProfileSpec) -> NamespacedCloudProfile {
        NamespacedCloudProfile {
            metadata: mk_meta(Some("garden-dev"), "custom"),
            spec: NamespacedCloudProfileSpec {
                parent: garden::CloudProfileReference {
                    kind: "CloudProfile".into(),
                    name: "aws".into(),
                },
                ..spec
            },
            status: None,
        }
    }

    fn with_limit(max_nodes_total: i32) -> NamespacedCloudProfileSpec {
        NamespacedCloudProfileSpec {
            limits: Some(Limits {
                max_nodes_total: Some(max_nodes_total),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn namespaced_profile_creation_checks_each_set_group() {
        let authz = Arc::new(RecordingAuthorizer::allow());
        let profile = mk_namespaced_profile(NamespacedCloudProfileSpec {
            kubernetes: Some(KubernetesSettings {
                versions: vec![ExpirableVersion {
                    version: "1.33.0".into(),
                    ..Default::default()
                }],
            }),
            provider_config: Some(serde_json::json!({"apiVersion": "aws/v1alpha1"})),
            ..with_limit(200)
        });
        let attrs = Attributes::new(Operation::Create, profile, mk_user("alice"));
        authorizer(&authz).validate(&attrs).await.unwrap();

        assert_eq!(
            authz.verbs(),
            vec![
                VERB_MODIFY_KUBERNETES,
                VERB_MODIFY_PROVIDER_CONFIG,
                VERB_RAISE_LIMITS
            ]
        );
        let calls = authz.calls();
        assert_eq!(calls[0].resource, "namespacedcloudprofiles");
        assert_eq!(calls[0].namespace, "garden-dev");
    }

    #[tokio::test]
    async fn limits_within_the_parent_are_not_a_raise() {
        let authz = Arc::new(RecordingAuthorizer::deny(VERB_RAISE_LIMITS, "custom"));
        let attrs = Attributes::new(
            Operation::Create,
            mk_namespaced_profile(with_limit(50)),
            mk_user("alice"),
        );
        authorizer(&authz).validate(&attrs).await.unwrap();
        assert!(authz.calls().is_empty());

        let old = mk_namespaced_profile(with_limit(200));
        let new = mk_namespaced_profile(with_limit(200));
        let attrs = Attributes::new(Operation::Update, new, mk_user("alice")).with_old_object(old);
        authorizer(&authz).validate(&attrs).await.unwrap();
        assert!(authz.calls().is_empty(), "an unchanged limit is not a raise");

        let old = mk_namespaced_profile(with_limit(50));
        let new = mk_namespaced_profile(with_limit(150));
        let attrs = Attributes::new(Operation::Update, new, mk_user("alice")).with_old_object(old);
        let err = authorizer(&authz).validate(&attrs).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn limits_of_an_unknown_parent_are_invalid() {
        let authz = Arc::new(RecordingAuthorizer::allow());
        let mut profile = mk_namespaced_profile(with_limit(150));
        profile.spec.parent.name = "missing".into();
        let attrs = Attributes::new(Operation::Create, profile, mk_user("alice"));
        let err = authorizer(&authz).validate(&attrs).await.unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[tokio::test]
    async fn unchanged_namespaced_profile_is_not_checked() {
        let authz = Arc::new(RecordingAuthorizer::failing());
        let profile = mk_namespaced_profile(NamespacedCloudProfileSpec {
            provider_config: Some(serde_json::json!({"a": 1})),
            ..Default::default()
        });
        let mut new = profile.clone();
        new.metadata.labels = Some(Default::default());
        let attrs =
            Attributes::new(Operation::Update, new, mk_user("alice")).with_old_object(profile);
        authorizer(&authz).validate(&attrs).await.unwrap();
    }

    #[tokio::test]
    async fn authorizer_failures_are_internal() {
        let authz = Arc::new(RecordingAuthorizer::failing());
        let profile = mk_namespaced_profile(NamespacedCloudProfileSpec {
            provider_config: Some(serde_json::json!({"a": 1})),
            ..Default::default()
        });
        let attrs = Attributes::new(Operation::Create, profile, mk_user("alice"));
        let err = authorizer(&authz).validate(&attrs).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
