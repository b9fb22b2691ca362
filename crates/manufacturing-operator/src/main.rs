use clap::Parser;
use kube::{Client, CustomResourceExt};
use manufacturing_operator::{
    controller,
    crd::{Datacenter, Factory},
    logging,
};
use snafu::{ResultExt, Snafu};

#[derive(Parser)]
#[command(
    name = "Manufacturing Operator",
    author,
    version,
    about = "Kubernetes operator for manufacturing deployment topologies"
)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the Datacenter and Factory CRD objects as YAML.
    Crd,
    /// Run the operator.
    Run,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to serialize CRD"))]
    SerializeCrd { source: serde_yaml::Error },

    #[snafu(display("failed to create the Kubernetes client"))]
    CreateClient { source: kube::Error },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let opts = Opts::parse();

    match opts.command {
        Command::Crd => {
            println!(
                "{}---\n{}",
                serde_yaml::to_string(&Datacenter::crd()).context(SerializeCrdSnafu)?,
                serde_yaml::to_string(&Factory::crd()).context(SerializeCrdSnafu)?,
            );
        }
        Command::Run => {
            logging::initialize_logging("MANUFACTURING_OPERATOR_LOG");
            let client = Client::try_default().await.context(CreateClientSnafu)?;
            controller::run_controllers(client).await;
        }
    }

    Ok(())
}
