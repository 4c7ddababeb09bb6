mod cli;
mod claims;
mod config;
mod error;
mod logging;
mod routes;
mod run;
mod server;
mod state;

use cli::Args;

pub fn main() -> anyhow::Result<()> {
    logging::init();

    let args = argh::from_env::<Args>();
    args.run()
}
