use super::cli::Cli;
use super::config::FleetConfig;
use super::fabric::fleet_fabric::FleetFabric;
use super::fabric::hypervisor_fabric::HypervisorFabric;
use super::managers::fleet::{Fleet, InitSummary};
use super::managers::store::Store;
use super::storage::inventory::YamlInventoryStore;
use super::tls::pki::TlsIdentity;
use anyhow::Error;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct DaemonBuilder {}

impl DaemonBuilder {
    pub async fn build(cli: Cli) -> anyhow::Result<Daemon, Error> {
        let mut config = FleetConfig::load(&cli.config).await?;
        config.apply_overrides(&cli);
        config.validate()?;
        info!("Building fleet controller {}", config.name);

        let identity = Arc::new(TlsIdentity::load(&config.tls_path, &config.hostname).await?);
        let store: Arc<dyn Store + Send + Sync> =
            Arc::new(YamlInventoryStore::open(&config.inventory_path).await?);
        Self::build_with(&config, identity, store).await
    }

    pub async fn build_with(
        config: &FleetConfig,
        identity: Arc<TlsIdentity>,
        store: Arc<dyn Store + Send + Sync>,
    ) -> anyhow::Result<Daemon, Error> {
        let hypervisor_fabric = HypervisorFabric::new(identity, store.clone(), config.timeouts());
        let fleet = FleetFabric::new(store)
            .load_fleet(&hypervisor_fabric)
            .await?;
        Ok(Daemon {
            fleet,
            init_concurrency: config.init_concurrency,
            cancellation_token: CancellationToken::new(),
        })
    }
}

pub struct Daemon {
    fleet: Arc<dyn Fleet + Send + Sync>,
    init_concurrency: usize,
    cancellation_token: CancellationToken,
}

impl Daemon {
    /// Registry handed to the route layer.
    pub fn fleet(&self) -> Arc<dyn Fleet + Send + Sync> {
        self.fleet.clone()
    }

    /// Cancelling this token stops the daemon and abandons in flight calls.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn run(self) -> anyhow::Result<JoinHandle<Result<(), Error>>, Error> {
        info!("Starting application.");
        let mut init_thread = Self::spawn_init_thread(
            self.fleet.clone(),
            self.init_concurrency,
            self.cancellation_token.clone(),
        );
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        Ok(spawn(async move {
            let mut init_finished = false;
            loop {
                select! {
                    _ = sigint.recv() => {
                        info!("SIGINT received shutting down");
                        break;
                    }

                    _ = sigterm.recv() => {
                        info!("SIGTERM received shutting down");
                        break;
                    }

                    _ = self.cancellation_token.cancelled() => {
                        info!("Shutdown requested");
                        break;
                    }

                    v = &mut init_thread, if !init_finished => {
                        init_finished = true;
                        if let Err(err) = v {
                            error!("Startup pass failed: {}", err);
                        }
                    }
                }
            }
            info!("Shutting down application.");
            self.cancellation_token.cancel();

            if !init_finished {
                debug!("Startup pass result: {:?}", init_thread.await);
            }

            info!("Application successfully shutdown.");
            Ok(())
        }))
    }

    fn spawn_init_thread(
        fleet: Arc<dyn Fleet + Send + Sync>,
        concurrency: usize,
        token: CancellationToken,
    ) -> JoinHandle<InitSummary> {
        tokio::spawn(async move { fleet.init_all(concurrency, &token).await })
    }
}
