use anyhow::Error;
use clap::Parser;
use fleet_daemon::{cli::Cli, daemon::DaemonBuilder};
use log::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<(), Error> {
    env_logger::init();
    let cli = Cli::parse();

    match DaemonBuilder::build(cli).await {
        Ok(daemon) => {
            let daemon_thread_handle = daemon.run().await?;
            daemon_thread_handle.await?
        }
        Err(err) => {
            error!("{:#}", err);
            Err(err)
        }
    }
}
