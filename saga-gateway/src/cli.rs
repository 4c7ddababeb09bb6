use argh::FromArgs;
use dotenvy::dotenv;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/saga_core";
pub const DEFAULT_BUS_BROKERS: &str = "localhost:9092";

/// the order saga gateway
#[derive(Debug, FromArgs)]
pub struct Args {
    #[argh(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
pub enum Command {
    Run(RunArgs),
}

/// run the gateway: HTTP API, outbox publisher, and event projector
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
pub struct RunArgs {
    /// address to bind the HTTP listener to
    #[argh(option, default = "DEFAULT_BIND_ADDR.into()")]
    pub bind_addr: String,

    /// postgres connection string
    #[argh(option, default = "DEFAULT_DATABASE_URL.into()")]
    pub database_url: String,

    /// comma-separated Kafka bootstrap servers
    #[argh(option, default = "DEFAULT_BUS_BROKERS.into()")]
    pub bus_brokers: String,

    /// use the in-memory bus instead of Kafka. Intended for local
    /// development and the `--strict-config` test harness, never for
    /// production.
    #[argh(switch)]
    pub in_memory_bus: bool,
}

// -- impl Args -- //

impl Args {
    pub fn run(self) -> anyhow::Result<()> {
        // Best-effort: local dev loads a `.env`, production supplies real
        // env vars and this just finds nothing to load.
        let _ = dotenv();

        match self.cmd {
            Command::Run(args) => {
                let rt = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build tokio runtime");
                rt.block_on(crate::run::run(args))
            }
        }
    }
}
