use crate::WaitFor;
use garden_admission_controller_core::{
    authorizer, AuthorizationAttributes, Attributes, Error, Kind, Operation, Plugin, ReadyGate,
    Registration, SharedAuthorizer, Validate,
};
use garden_admission_controller_k8s_api::{
    constants, security, CredentialsReference, Seed, WorkloadIdentity,
};
use garden_admission_controller_k8s_index::{Cache, Caches};
use tracing::debug;

pub const NAME: &str = "ResourceReferenceManager";

const FIELD: &str = "spec.backup.credentialsRef";

/// Requires the requester to be allowed to read the credentials a Seed's backup refers to.
///
/// When the reference changes, the requester must also be allowed to read the previously
/// referenced credentials, so that a Seed cannot be used to take over credentials that were
/// configured by someone else.
pub struct ResourceReferenceManager {
    gate: ReadyGate,
    workload_identities: Cache<WorkloadIdentity>,
    authorizer: SharedAuthorizer,
}

impl ResourceReferenceManager {
    pub fn new(gate: ReadyGate, caches: &Caches, authorizer: SharedAuthorizer) -> Self {
        Self {
            gate: gate.wait_for(&caches.workload_identities),
            workload_identities: caches.workload_identities.clone(),
            authorizer,
        }
    }

    /// Checks that a WorkloadIdentity exists and targets the backup provider.
    fn check_workload_identity(
        &self,
        reference: &CredentialsReference,
        provider: &str,
    ) -> Result<(), Error> {
        let identity = self
            .workload_identities
            .get(&reference.namespace, &reference.name)
            .ok_or_else(|| {
                Error::invalid_field(FIELD, format_args!("{reference} not found"))
            })?;
        let target = identity.spec.target_system.type_.as_str();
        if target != provider {
            return Err(Error::forbidden_field(
                FIELD,
                format_args!(
                    "{reference} targets {target:?}, but the backup provider is {provider:?}"
                ),
            ));
        }
        Ok(())
    }

    async fn authorize(
        &self,
        attrs: &Attributes,
        reference: &CredentialsReference,
    ) -> Result<(), Error> {
        let (group, resource) = resource_of(reference)?;
        let request = AuthorizationAttributes::new(&attrs.user, "get")
            .resource(group, resource)
            .object(&reference.namespace, &reference.name);
        debug!(%reference, user = %attrs.user.name, "Authorizing credentials reference");
        authorizer::require(&*self.authorizer, &request).await
    }
}

impl Plugin for ResourceReferenceManager {
    fn registration(&self) -> Registration {
        Registration::new(NAME, &[Kind::Seed], &[Operation::Create, Operation::Update])
    }

    fn ready_gate(&self) -> &ReadyGate {
        &self.gate
    }
}

#[async_trait::async_trait]
impl Validate for ResourceReferenceManager {
    async fn validate(&self, attrs: &Attributes) -> Result<(), Error> {
        let seed = attrs.object::<Seed>()?;
        let Some(backup) = seed.spec.backup.as_ref() else {
            return Ok(());
        };
        let Some(reference) = backup.credentials() else {
            return Ok(());
        };

        let previous = match attrs.old_object::<Seed>()? {
            Some(old) => old.backup_credentials(),
            None => None,
        };
        if previous.as_ref() == Some(&reference) {
            return Ok(());
        }

        resource_of(&reference)?;
        if reference.kind == constants::KIND_WORKLOAD_IDENTITY {
            self.check_workload_identity(&reference, &backup.provider)?;
        }

        if let Some(previous) = previous.as_ref() {
            self.authorize(attrs, previous).await?;
        }
        self.authorize(attrs, &reference).await
    }
}

/// The API group and resource of a credentials kind.
fn resource_of(reference: &CredentialsReference) -> Result<(&'static str, &'static str), Error> {
    match reference.kind.as_str() {
        constants::KIND_SECRET => Ok(("", "secrets")),
        constants::KIND_WORKLOAD_IDENTITY => Ok((security::GROUP, "workloadidentities")),
        kind => Err(Error::invalid_field(
            FIELD,
            format_args!("unsupported credentials kind {kind:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use garden_admission_controller_k8s_api::{
        garden::{seed::SeedBackup, SecretReference},
        security::{TargetSystem, WorkloadIdentitySpec},
    };
    use std::sync::Arc;

    fn with_backup(mut seed: Seed, reference: CredentialsReference) -> Seed {
        seed.spec.backup = Some(SeedBackup {
            provider: "aws".into(),
            region: None,
            credentials_ref: Some(reference),
            secret_ref: None,
        });
        seed
    }

    fn mk_identity(name: &str, target: &str) -> WorkloadIdentity {
        WorkloadIdentity {
            metadata: mk_meta(Some("garden"), name),
            spec: WorkloadIdentitySpec {
                audiences: vec!["sts.amazonaws.com".into()],
                target_system: TargetSystem {
                    type_: target.into(),
                },
            },
        }
    }

    fn manager(authz: &Arc<RecordingAuthorizer>) -> ResourceReferenceManager {
        let caches = Caches {
            workload_identities: Cache::synced_with([
                mk_identity("aws-backup", "aws"),
                mk_identity("gcp-backup", "gcp"),
            ]),
            ..Default::default()
        };
        ResourceReferenceManager::new(ReadyGate::default(), &caches, authz.clone())
    }

    #[tokio::test]
    async fn create_authorizes_the_reference_once() {
        let authz = Arc::new(RecordingAuthorizer::allow());
        let seed = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::secret("backup", "garden"),
        );
        let attrs = Attributes::new(Operation::Create, seed, mk_user("alice"));
        manager(&authz).validate(&attrs).await.expect("must admit");

        let calls = authz.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].verb, "get");
        assert_eq!(calls[0].resource, "secrets");
        assert_eq!((calls[0].namespace.as_str(), calls[0].name.as_str()), ("garden", "backup"));
        assert_eq!(calls[0].user.name, "alice");
    }

    #[tokio::test]
    async fn unchanged_reference_is_not_authorized() {
        let authz = Arc::new(RecordingAuthorizer::deny("get", "backup"));
        let seed = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::secret("backup", "garden"),
        );
        let mut new = seed.clone();
        new.spec.provider.zones = Some(vec!["a".into()]);
        let attrs =
            Attributes::new(Operation::Update, new, mk_user("alice")).with_old_object(seed);
        assert!(manager(&authz).validate(&attrs).await.is_ok());
        assert!(authz.calls().is_empty());
    }

    #[tokio::test]
    async fn changed_reference_authorizes_old_then_new() {
        let authz = Arc::new(RecordingAuthorizer::allow());
        let old = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::secret("a", "garden"),
        );
        let new = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::secret("b", "garden"),
        );
        let attrs = Attributes::new(Operation::Update, new, mk_user("alice")).with_old_object(old);
        manager(&authz).validate(&attrs).await.expect("must admit");

        let names = authz
            .calls()
            .into_iter()
            .map(|c| c.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn denial_of_the_previous_reference_forbids() {
        let authz = Arc::new(RecordingAuthorizer::deny("get", "a"));
        let old = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::secret("a", "garden"),
        );
        let new = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::secret("b", "garden"),
        );
        let attrs =
            Attributes::new(Operation::Update, new, mk_user("mallory")).with_old_object(old);
        let err = manager(&authz).validate(&attrs).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(authz.calls().len(), 1);
    }

    #[tokio::test]
    async fn legacy_secret_ref_is_authorized_as_secret() {
        let authz = Arc::new(RecordingAuthorizer::allow());
        let mut seed = mk_seed("aws", &[]);
        seed.spec.backup = Some(SeedBackup {
            provider: "aws".into(),
            region: None,
            credentials_ref: None,
            secret_ref: Some(SecretReference {
                name: "legacy".into(),
                namespace: "garden".into(),
            }),
        });
        let attrs = Attributes::new(Operation::Create, seed, mk_user("alice"));
        manager(&authz).validate(&attrs).await.expect("must admit");
        assert_eq!(authz.calls()[0].resource, "secrets");
    }

    #[tokio::test]
    async fn workload_identity_must_target_the_backup_provider() {
        let authz = Arc::new(RecordingAuthorizer::allow());
        let seed = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::workload_identity("aws-backup", "garden"),
        );
        let attrs = Attributes::new(Operation::Create, seed, mk_user("alice"));
        manager(&authz).validate(&attrs).await.expect("must admit");
        let calls = authz.calls();
        assert_eq!(calls[0].group, "security.gardener.cloud");
        assert_eq!(calls[0].resource, "workloadidentities");

        let seed = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::workload_identity("gcp-backup", "garden"),
        );
        let attrs = Attributes::new(Operation::Create, seed, mk_user("alice"));
        let err = manager(&authz).validate(&attrs).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let seed = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::workload_identity("missing", "garden"),
        );
        let attrs = Attributes::new(Operation::Create, seed, mk_user("alice"));
        let err = manager(&authz).validate(&attrs).await.unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[tokio::test]
    async fn unsupported_kinds_are_invalid() {
        let authz = Arc::new(RecordingAuthorizer::allow());
        let seed = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference {
                api_version: "v1".into(),
                kind: "ConfigMap".into(),
                name: "backup".into(),
                namespace: "garden".into(),
            },
        );
        let attrs = Attributes::new(Operation::Create, seed, mk_user("alice"));
        let err = manager(&authz).validate(&attrs).await.unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
        assert!(authz.calls().is_empty());
    }

    #[tokio::test]
    async fn authorizer_failures_are_internal() {
        let authz = Arc::new(RecordingAuthorizer::failing());
        let seed = with_backup(
            mk_seed("aws", &[]),
            CredentialsReference::secret("backup", "garden"),
        );
        let attrs = Attributes::new(Operation::Create, seed, mk_user("alice"));
        let err = manager(&authz).validate(&attrs).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
