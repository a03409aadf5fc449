use garden_admission_controller_core::{AuthorizationAttributes, Authorize, Decision, User};
use garden_admission_controller_k8s_api::{
    constants,
    garden::{
        cloud_profile::{MachineType, MachineTypeStorage, VolumeType},
        project::ProjectSpec,
        seed::SeedProvider,
        shoot::{Machine, Provider, Volume, Worker},
        CloudProfileSpec, SeedSpec, ShootSpec,
    },
    CloudProfile, CloudProfileReference, ObjectMeta, Project, Secret, Seed, Shoot,
};
use maplit::btreemap;
use parking_lot::Mutex;

pub fn trace_init() -> tracing::subscriber::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

pub fn mk_user(name: &str) -> User {
    User {
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn mk_meta(namespace: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: namespace.map(Into::into),
        name: Some(name.to_string()),
        uid: Some(format!("{}-{name}-uid", namespace.unwrap_or("cluster"))),
        ..Default::default()
    }
}

/// A Shoot on the `aws` profile with a single `m5.large` worker pool of at most two machines,
/// each with a 20Gi `gp3` volume.
pub fn mk_shoot(namespace: &str, name: &str) -> Shoot {
    Shoot {
        metadata: mk_meta(Some(namespace), name),
        spec: ShootSpec {
            cloud_profile: Some(CloudProfileReference {
                kind: constants::KIND_CLOUD_PROFILE.into(),
                name: "aws".into(),
            }),
            provider: Provider {
                type_: "aws".into(),
                workers: vec![mk_worker("worker", "m5.large", 2)],
            },
            region: "eu-west-1".into(),
            secret_binding_name: Some("aws".into()),
            ..Default::default()
        },
        status: None,
    }
}

pub fn mk_worker(name: &str, machine_type: &str, maximum: i32) -> Worker {
    Worker {
        name: name.into(),
        machine: Machine {
            type_: machine_type.into(),
        },
        minimum: 1,
        maximum,
        volume: Some(Volume {
            name: None,
            type_: Some("gp3".into()),
            volume_size: "20Gi".into(),
        }),
    }
}

/// A CloudProfile offering `m5.large` (2 CPU, 8Gi), `m5d.xlarge` (4 CPU, 16Gi, 100Gi fixed
/// premium storage) and `p3.2xlarge` (8 CPU, 1 GPU, 61Gi), with the `gp3` (standard) and `io1`
/// (premium) volume types.
pub fn mk_cloud_profile(name: &str) -> CloudProfile {
    CloudProfile {
        metadata: mk_meta(None, name),
        spec: CloudProfileSpec {
            machine_types: vec![
                MachineType {
                    name: "m5.large".into(),
                    cpu: "2".into(),
                    gpu: "0".into(),
                    memory: "8Gi".into(),
                    ..Default::default()
                },
                MachineType {
                    name: "m5d.xlarge".into(),
                    cpu: "4".into(),
                    gpu: "0".into(),
                    memory: "16Gi".into(),
                    storage: Some(MachineTypeStorage {
                        class: constants::VOLUME_CLASS_PREMIUM.into(),
                        storage_size: Some("100Gi".into()),
                        type_: "nvme".into(),
                        min_size: None,
                    }),
                    ..Default::default()
                },
                MachineType {
                    name: "p3.2xlarge".into(),
                    cpu: "8".into(),
                    gpu: "1".into(),
                    memory: "61Gi".into(),
                    ..Default::default()
                },
            ],
            volume_types: Some(vec![
                VolumeType {
                    name: "gp3".into(),
                    class: constants::VOLUME_CLASS_STANDARD.into(),
                    ..Default::default()
                },
                VolumeType {
                    name: "io1".into(),
                    class: constants::VOLUME_CLASS_PREMIUM.into(),
                    ..Default::default()
                },
            ]),
            type_: "aws".into(),
            ..Default::default()
        },
    }
}

pub fn mk_seed(name: &str, zones: &[&str]) -> Seed {
    Seed {
        metadata: mk_meta(None, name),
        spec: SeedSpec {
            backup: None,
            provider: SeedProvider {
                type_: "aws".into(),
                region: "eu-west-1".into(),
                zones: Some(zones.iter().map(|z| z.to_string()).collect()),
            },
        },
    }
}

pub fn mk_project(name: &str, namespace: &str) -> Project {
    Project {
        metadata: mk_meta(None, name),
        spec: ProjectSpec {
            namespace: Some(namespace.into()),
            ..Default::default()
        },
    }
}

/// A default-domain secret in the `garden` namespace.
pub fn mk_domain_secret(name: &str, domain: &str, priority: Option<i32>) -> Secret {
    let mut annotations = btreemap! {
        constants::ANNOTATION_DNS_DOMAIN.to_string() => domain.to_string(),
        constants::ANNOTATION_DNS_PROVIDER.to_string() => "aws-route53".to_string(),
    };
    if let Some(priority) = priority {
        annotations.insert(
            constants::ANNOTATION_DNS_DEFAULT_DOMAIN_PRIORITY.to_string(),
            priority.to_string(),
        );
    }
    Secret {
        metadata: ObjectMeta {
            annotations: Some(annotations),
            labels: Some(btreemap! {
                constants::LABEL_ROLE.to_string() => constants::ROLE_DEFAULT_DOMAIN.to_string(),
            }),
            ..mk_meta(Some("garden"), name)
        },
        ..Default::default()
    }
}

/// An authorizer that records every request and denies the configured verb and name pairs.
#[derive(Debug, Default)]
pub struct RecordingAuthorizer {
    calls: Mutex<Vec<AuthorizationAttributes>>,
    denied: Vec<(String, String)>,
    failing: bool,
}

impl RecordingAuthorizer {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn deny(verb: &str, name: &str) -> Self {
        Self {
            denied: vec![(verb.to_string(), name.to_string())],
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<AuthorizationAttributes> {
        self.calls.lock().clone()
    }

    pub fn verbs(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.verb.clone()).collect()
    }
}

#[async_trait::async_trait]
impl Authorize for RecordingAuthorizer {
    async fn authorize(&self, attrs: &AuthorizationAttributes) -> anyhow::Result<Decision> {
        self.calls.lock().push(attrs.clone());
        if self.failing {
            anyhow::bail!("authorizer unavailable");
        }
        let denied = self
            .denied
            .iter()
            .any(|(verb, name)| *verb == attrs.verb && *name == attrs.name);
        if denied {
            return Ok(Decision::Deny(String::new()));
        }
        Ok(Decision::Allow)
    }
}
