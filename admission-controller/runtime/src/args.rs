use crate::{
    admission::Admission,
    authorizer::SubjectAccessReviewer,
    index::{metrics::Families, Caches},
    k8s::{self, constants},
    plugins::{self, PLUGINS},
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use tracing::{debug, info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "garden-admission", about = "Admission plugins for the garden API")]
pub struct Args {
    #[clap(
        long,
        default_value = "garden=info,warn",
        env = "GARDEN_ADMISSION_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission webhook server; caches are still fed.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// The namespace holding the default-domain secrets.
    #[clap(long, default_value = "garden")]
    garden_namespace: String,

    /// How long a request waits for the caches of a plugin to sync.
    #[clap(long, default_value = "10")]
    ready_timeout_secs: u64,

    /// Plugins that are not registered, e.g. `ShootQuotaValidator,ShootDNS`.
    #[clap(long, value_delimiter = ',')]
    disable_plugins: Vec<String>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            garden_namespace,
            ready_timeout_secs,
            disable_plugins,
        } = self;

        let unknown = unknown_plugins(&disable_plugins);
        if !unknown.is_empty() {
            bail!("unknown admission plugins {unknown:?}; expected any of {PLUGINS:?}");
        }

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let mut prom = <Registry>::default();
        let families = Families::register(prom.sub_registry_with_prefix("index"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        let caches = Caches::default();
        let authorizer = Arc::new(SubjectAccessReviewer::new(runtime.client()));
        let config = plugins::Config {
            garden_namespace: garden_namespace.clone(),
            ready_timeout: Duration::from_secs(ready_timeout_secs),
            disabled: disable_plugins,
        };
        let pipeline = plugins::pipeline(&config, &caches, authorizer);
        info!(plugins = ?pipeline.plugins(), "Admission plugins registered");

        // Only the caches some enabled plugin reads are fed; the others never sync and nothing
        // waits on them.
        let needed = pipeline.caches();
        let watched = |name: &str| {
            let watched = needed.contains(name);
            if !watched {
                debug!(cache = name, "Not watched");
            }
            watched
        };

        if watched(caches.shoots.name()) {
            let shoots = runtime.watch_all::<k8s::Shoot>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(families.metered(caches.shoots.clone()), shoots)
                    .instrument(info_span!("shoots")),
            );
        }

        if watched(caches.quotas.name()) {
            let quotas = runtime.watch_all::<k8s::Quota>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(families.metered(caches.quotas.clone()), quotas)
                    .instrument(info_span!("quotas")),
            );
        }

        if watched(caches.secret_bindings.name()) {
            let bindings = runtime.watch_all::<k8s::SecretBinding>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(
                    families.metered(caches.secret_bindings.clone()),
                    bindings,
                )
                .instrument(info_span!("secretbindings")),
            );
        }

        if watched(caches.credentials_bindings.name()) {
            let bindings =
                runtime.watch_all::<k8s::CredentialsBinding>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(
                    families.metered(caches.credentials_bindings.clone()),
                    bindings,
                )
                .instrument(info_span!("credentialsbindings")),
            );
        }

        if watched(caches.namespaced_cloud_profiles.name()) {
            let profiles =
                runtime.watch_all::<k8s::NamespacedCloudProfile>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(
                    families.metered(caches.namespaced_cloud_profiles.clone()),
                    profiles,
                )
                .instrument(info_span!("namespacedcloudprofiles")),
            );
        }

        if watched(caches.oidc_presets.name()) {
            let presets = runtime.watch_all::<k8s::OpenIDConnectPreset>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(families.metered(caches.oidc_presets.clone()), presets)
                    .instrument(info_span!("openidconnectpresets")),
            );
        }

        if watched(caches.workload_identities.name()) {
            let identities =
                runtime.watch_all::<k8s::WorkloadIdentity>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(
                    families.metered(caches.workload_identities.clone()),
                    identities,
                )
                .instrument(info_span!("workloadidentities")),
            );
        }

        if watched(caches.default_domain_secrets.name()) {
            let secrets = runtime.watch_namespaced::<k8s::Secret>(
                garden_namespace.clone(),
                watcher::Config::default().labels(&default_domain_selector()),
            );
            tokio::spawn(
                kubert::index::namespaced(
                    families.metered(caches.default_domain_secrets.clone()),
                    secrets,
                )
                .instrument(info_span!("secrets", ns = %garden_namespace)),
            );
        }

        // Cluster-scoped resources.

        if watched(caches.projects.name()) {
            let projects = runtime.watch_all::<k8s::Project>(watcher::Config::default());
            tokio::spawn(
                kubert::index::cluster(families.metered(caches.projects.clone()), projects)
                    .instrument(info_span!("projects")),
            );
        }

        if watched(caches.cloud_profiles.name()) {
            let profiles = runtime.watch_all::<k8s::CloudProfile>(watcher::Config::default());
            tokio::spawn(
                kubert::index::cluster(families.metered(caches.cloud_profiles.clone()), profiles)
                    .instrument(info_span!("cloudprofiles")),
            );
        }

        let runtime = runtime.spawn_server(move || Admission::new(pipeline));

        // Block the main thread on the shutdown signal. Once it fires, wait for the background
        // tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

fn default_domain_selector() -> String {
    format!("{}={}", constants::LABEL_ROLE, constants::ROLE_DEFAULT_DOMAIN)
}

/// Plugin names are compared exactly.
fn unknown_plugins(disabled: &[String]) -> BTreeSet<&str> {
    disabled
        .iter()
        .map(String::as_str)
        .filter(|name| !PLUGINS.contains(name))
        .collect()
}
