use anyhow::Result;
use clap::Parser;
use host_monitor::app::ApplicationBuilder;
use host_monitor::config::AgentArgs;
use host_monitor::config::Cli;
use host_monitor::config::Commands;
use host_monitor::config::InstanceTypeArgs;
use host_monitor::instance_type::detect_instance_type;
use host_monitor::instance_type::InstanceTypeConfig;
use utils::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start(agent_args) => run_agent(*agent_args).await,
        Commands::InstanceType(args) => run_instance_type(&args),
    }
}

async fn run_agent(agent_args: AgentArgs) -> Result<()> {
    let _guard = logging::init(agent_args.log_file.as_deref())?;

    tracing::info!(
        branch = version::branch(),
        "Starting host monitor {}",
        &**version::VERSION
    );

    let app = ApplicationBuilder::new(agent_args).build()?;
    app.run().await?;

    tracing::info!("Host monitor stopped");
    Ok(())
}

fn run_instance_type(args: &InstanceTypeArgs) -> Result<()> {
    let _guard = logging::init(None)?;
    println!("{}", detect_instance_type(&InstanceTypeConfig::from(args)));
    Ok(())
}
