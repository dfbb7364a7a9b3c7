use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use ibx::app::{App, Commands};
use ibx::util;

#[derive(Debug, Parser)]
#[command(author, version, about = "The innobase tablespace(*.ibd) inspector", long_about = None)]
pub struct Args {
    /// Input innodb tablespace file, for example employees.ibd
    input: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    util::init();

    let args = Args::parse();
    let mut app = App::new(args.input);

    app.run(args.command)?;

    info!("time costs {:?}", app.time_costs());
    Ok(())
}
