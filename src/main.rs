use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Builder;

use sospf::config::RouterConfig;
use sospf::network::RouterServer;
use sospf::shell::{self, Command};
use sospf::Router;

#[derive(Parser)]
#[command(name = "sospf", about = "Simulated link-state router")]
struct Cli {
    /// JSON configuration file; command-line values override it
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Simulated address this router answers to
    #[arg(long)]
    sim_addr: Option<String>,

    /// Lifetime of a flooded update, in milliseconds
    #[arg(long)]
    ttl_ms: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<RouterConfig> {
        let mut config = match &self.config {
            Some(path) => RouterConfig::load_from_file(path)?,
            None => {
                let port = self
                    .port
                    .ok_or_else(|| anyhow::anyhow!("--port is required without --config"))?;
                let sim_addr = self
                    .sim_addr
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("--sim-addr is required without --config"))?;
                RouterConfig::new("127.0.0.1", port, sim_addr)
            }
        };
        if let Some(host) = self.host {
            config.process_host = host;
        }
        if let Some(port) = self.port {
            config.process_port = port;
        }
        if let Some(sim_addr) = self.sim_addr {
            config.simulated_address = sim_addr;
        }
        if let Some(ttl) = self.ttl_ms {
            config.protocol.ttl_budget_ms = ttl;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Cli::parse().into_config()?;

    let rt = Builder::new_multi_thread().enable_all().build()?;

    rt.block_on(async {
        let server = RouterServer::bind(
            &config.process_host,
            config.process_port,
            config.protocol.worker_pool_size,
        )
        .await?;
        let router = Router::from_config(&config);
        server.spawn(Arc::clone(&router));
        info!("Router {} ready, type commands", router.identity());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    error!("{:#}", e);
                    continue;
                }
            };
            let quitting = command == Command::Quit;
            print!("{}", shell::execute(&router, command).await);
            if quitting {
                std::process::exit(0);
            }
        }

        // stdin closed: leave the network the same way `quit` does.
        router.quit().await;
        Ok::<(), anyhow::Error>(())
    })
}
