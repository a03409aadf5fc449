//! Assigns and validates the DNS domain of Shoots.
//!
//! A Shoot without a domain is assigned `<shoot>.<project>.<default-domain>` from the
//! highest-priority default domain, where default domains are published as labeled secrets in
//! the garden namespace. A Shoot that picks a domain below a default domain must follow the
//! same scheme once it is scheduled.
//!
//! The plugin also maintains the primary flag of the Shoot's DNS providers: at most one
//! provider is primary, and the primary provider is the one that manages the Shoot's domain.

use crate::WaitFor;
use garden_admission_controller_core::{
    Attributes, Error, Kind, Mutate, Operation, Plugin, ReadyGate, Registration,
};
use garden_admission_controller_k8s_api::{
    constants,
    garden::shoot::DnsProvider,
    Project, ResourceExt, Secret, Shoot,
};
use garden_admission_controller_k8s_index::{Cache, Caches};
use rand::{distributions::Uniform, Rng};
use tracing::debug;

pub const NAME: &str = "ShootDNS";

const GENERATED_NAME_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of characters the API server appends to a `generateName` prefix.
const GENERATED_NAME_SUFFIX_LEN: usize = 5;

pub struct ShootDns {
    gate: ReadyGate,
    garden_namespace: String,
    projects: Cache<Project>,
    secrets: Cache<Secret>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct DefaultDomain {
    name: String,
    domain: String,
    priority: i32,
}

// === impl ShootDns ===

impl ShootDns {
    pub fn new(gate: ReadyGate, caches: &Caches, garden_namespace: String) -> Self {
        Self {
            gate: gate
                .wait_for(&caches.projects)
                .wait_for(&caches.default_domain_secrets),
            garden_namespace,
            projects: caches.projects.clone(),
            secrets: caches.default_domain_secrets.clone(),
        }
    }

    /// Default domains ordered by descending priority. Equal priorities are ordered by the
    /// secrets' names.
    fn default_domains(&self) -> Result<Vec<DefaultDomain>, Error> {
        let mut domains = self
            .secrets
            .list_namespace(&self.garden_namespace)
            .iter()
            .filter(|secret| {
                secret.labels().get(constants::LABEL_ROLE).map(String::as_str)
                    == Some(constants::ROLE_DEFAULT_DOMAIN)
            })
            .filter_map(|secret| DefaultDomain::from_secret(secret).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        domains.sort_by(|a, b| a.name.cmp(&b.name));
        domains.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(domains)
    }

    /// Finds the Project that owns the namespace.
    fn project(&self, namespace: &str) -> Result<std::sync::Arc<Project>, Error> {
        self.projects
            .list()
            .into_iter()
            .find(|p| p.spec.namespace.as_deref() == Some(namespace))
            .ok_or_else(|| {
                Error::internal(anyhow::anyhow!(
                    "no project found for namespace {namespace:?}"
                ))
            })
    }
}

impl Plugin for ShootDns {
    fn registration(&self) -> Registration {
        Registration::new(
            NAME,
            &[Kind::Shoot],
            &[Operation::Create, Operation::Update],
        )
    }

    fn ready_gate(&self) -> &ReadyGate {
        &self.gate
    }
}

#[async_trait::async_trait]
impl Mutate for ShootDns {
    async fn admit(&self, attrs: &mut Attributes) -> Result<(), Error> {
        if !attrs.subresource.is_empty() && attrs.subresource != constants::SUBRESOURCE_BINDING {
            return Ok(());
        }

        let old = attrs.old_object::<Shoot>()?.cloned();
        let shoot = attrs.object::<Shoot>()?;
        if let Some(old) = old.as_ref() {
            if old.seed_name().is_some()
                && old.seed_name() == shoot.seed_name()
                && old.spec.dns == shoot.spec.dns
            {
                return Ok(());
            }
        }

        let default_domains = self.default_domains()?;
        let project = self.project(&attrs.namespace)?;
        let mut dns = shoot.spec.dns.clone().unwrap_or_default();

        if dns.domain.is_none() {
            if let Some(default) = default_domains.first() {
                let domain = format!(
                    "{}.{}.{}",
                    shoot_label(shoot),
                    project.name_any(),
                    default.domain
                );
                debug!(%domain, secret = %default.name, "Assigning default domain");
                dns.domain = Some(domain);
            }
        }

        let is_default_domain = dns
            .domain
            .as_deref()
            .map(|domain| matched_default(domain, &default_domains).is_some())
            .unwrap_or(false);

        if let Some(domain) = dns.domain.as_deref() {
            let newly_scheduled = match old.as_ref() {
                None => true,
                Some(old) => old.dns_domain().is_none() || old.seed_name().is_none(),
            };
            if shoot.seed_name().is_some() && newly_scheduled {
                check_domain(shoot, &project.name_any(), domain, &default_domains)?;
            }
        }

        let providers = dns.providers.get_or_insert_with(Vec::new);
        if is_default_domain && providers.iter().any(is_primary) {
            return Err(Error::forbidden_field(
                "spec.dns.providers",
                "a primary DNS provider must not be set when a default domain is used",
            ));
        }
        if providers.iter().filter(|p| is_primary(p)).count() > 1 {
            return Err(Error::invalid_field(
                "spec.dns.providers",
                "only one DNS provider can be primary",
            ));
        }

        if !providers.is_empty() && !providers.iter().any(is_primary) {
            let previous = old
                .as_ref()
                .and_then(|old| old.spec.dns.as_ref())
                .and_then(|dns| dns.providers.as_ref())
                .and_then(|providers| providers.iter().find(|p| is_primary(p)));
            let remarked = previous.and_then(|previous| {
                providers.iter().position(|p| {
                    p.type_ == previous.type_ && p.secret_name == previous.secret_name
                })
            });
            match remarked {
                Some(i) => providers[i].primary = Some(true),
                None if !is_default_domain => providers[0].primary = Some(true),
                None => {}
            }
        }

        for (i, provider) in providers.iter().enumerate() {
            if !is_primary(provider) && (provider.type_.is_none() || provider.secret_name.is_none())
            {
                return Err(Error::invalid_field(
                    format!("spec.dns.providers[{i}]"),
                    "non-primary DNS providers must specify a type and a secret name",
                ));
            }
        }
        if providers.is_empty() {
            dns.providers = None;
        }

        if shoot.spec.dns.clone().unwrap_or_default() != dns {
            attrs.object_mut::<Shoot>()?.spec.dns = Some(dns);
        }
        Ok(())
    }
}

// === impl DefaultDomain ===

impl DefaultDomain {
    /// Reads a default domain from a secret's annotations. Secrets without a domain are
    /// skipped.
    fn from_secret(secret: &Secret) -> Result<Option<Self>, Error> {
        let annotations = secret.annotations();
        let domain = match annotations.get(constants::ANNOTATION_DNS_DOMAIN) {
            Some(domain) if !domain.is_empty() => domain.clone(),
            _ => return Ok(None),
        };
        let priority = match annotations.get(constants::ANNOTATION_DNS_DEFAULT_DOMAIN_PRIORITY) {
            None => 0,
            Some(p) => p.parse().map_err(|error| {
                Error::internal(anyhow::anyhow!(
                    "default domain secret {} has an invalid priority {p:?}: {error}",
                    secret.name_any()
                ))
            })?,
        };
        Ok(Some(Self {
            name: secret.name_any(),
            domain,
            priority,
        }))
    }
}

fn is_primary(provider: &DnsProvider) -> bool {
    provider.primary == Some(true)
}

/// The name a default domain is derived from. Shoots created with `generateName` get a random
/// label of the length the API server would generate.
fn shoot_label(shoot: &Shoot) -> String {
    match (&shoot.metadata.name, &shoot.metadata.generate_name) {
        (Some(name), _) if !name.is_empty() => name.clone(),
        (_, Some(prefix)) if !prefix.is_empty() => {
            random_label(prefix.len() + GENERATED_NAME_SUFFIX_LEN)
        }
        _ => String::new(),
    }
}

fn random_label(len: usize) -> String {
    let dist = Uniform::from(0..GENERATED_NAME_CHARSET.len());
    rand::thread_rng()
        .sample_iter(dist)
        .take(len)
        .map(|i| GENERATED_NAME_CHARSET[i] as char)
        .collect()
}

fn matched_default<'d>(domain: &str, defaults: &'d [DefaultDomain]) -> Option<&'d DefaultDomain> {
    defaults.iter().find(|d| {
        domain
            .strip_suffix(d.domain.as_str())
            .map(|prefix| prefix.ends_with('.'))
            .unwrap_or(false)
    })
}

/// A domain below a default domain must be `<shoot>.<project>.<default-domain>`.
fn check_domain(
    shoot: &Shoot,
    project: &str,
    domain: &str,
    defaults: &[DefaultDomain],
) -> Result<(), Error> {
    let Some(default) = matched_default(domain, defaults) else {
        return Ok(());
    };

    let name = shoot.metadata.name.as_deref().unwrap_or_default();
    if name.is_empty() && shoot.metadata.generate_name.is_some() {
        let suffix = format!(".{project}.{}", default.domain);
        if !domain.ends_with(&suffix) {
            return Err(Error::forbidden_field(
                "spec.dns.domain",
                format_args!(
                    "the domain uses a default domain but does not match the expected scheme \
                     <generated-name>{suffix} (got {domain:?})"
                ),
            ));
        }
        return Ok(());
    }

    let expected = format!("{name}.{project}.{}", default.domain);
    if domain != expected {
        return Err(Error::forbidden_field(
            "spec.dns.domain",
            format_args!(
                "the domain uses a default domain but does not match the expected scheme \
                 <shoot-name>.<project-name>.<default-domain> (expected {expected:?}, got \
                 {domain:?})"
            ),
        ));
    }
    Ok(())
}
