use clap::Parser;
use clap::Subcommand;
use utils::version;

use crate::config::agent::AgentArgs;
use crate::config::agent::InstanceTypeArgs;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the host monitoring agent
    Start(Box<AgentArgs>),
    /// Print the detected cloud instance type and exit
    #[command(name = "instance-type")]
    InstanceType(InstanceTypeArgs),
}
