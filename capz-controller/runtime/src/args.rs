use crate::{index, k8s, scopes::status};
use anyhow::{bail, Result};
use capz_controller_core::Environment;
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use tokio::sync::mpsc;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "capz-controller", about = "An Azure infrastructure controller")]
pub struct Args {
    #[clap(long, default_value = "capz=info,warn", env = "CAPZ_CONTROLLER_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Named Azure cloud the controller targets.
    #[clap(long, default_value = "AzurePublicCloud", env = "AZURE_ENVIRONMENT")]
    azure_environment: String,
}

// === impl Args ===

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            azure_environment,
        } = self;

        let environment = Environment::from_name(&azure_environment)?;

        let mut prom = <Registry>::default();
        let status_metrics =
            status::ControllerMetrics::register(prom.sub_registry_with_prefix("status"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let index = index::Index::shared(environment, updates_tx);

        let clusters = runtime.watch_all::<k8s::AzureCluster>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), clusters)
                .instrument(info_span!("azureclusters")),
        );

        let managed_clusters =
            runtime.watch_all::<k8s::AzureManagedCluster>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), managed_clusters)
                .instrument(info_span!("azuremanagedclusters")),
        );

        let control_planes = runtime.watch_all::<k8s::AroControlPlane>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), control_planes)
                .instrument(info_span!("arocontrolplanes")),
        );

        let status_controller =
            status::StatusController::new(runtime.client(), updates_rx, status_metrics);
        tokio::spawn(
            status_controller
                .process_updates()
                .instrument(info_span!("status_controller")),
        );

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
