use anyhow::Context;
use berth_cluster::KubeResourceClient;
use berth_core::ConsoleConfig;
use berth_engine::{Integration, MutationPlan, Orchestrator, TracingAuditSink, build_plan};
use berth_integrations::git_server::GitServerIntegration;
use berth_integrations::registry::RegistryIntegration;
use berth_integrations::{
    GitServerIntegrationRequest, RegistryIntegrationRequest, manage_git_server_integration,
    manage_registry_integration,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "berth", version, about = "Berth integration console CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the writes a request would perform, without touching the cluster.
    Plan {
        integration: IntegrationKind,

        /// Request JSON file.
        file: PathBuf,
    },

    /// Run an integration request against the configured cluster.
    Apply {
        integration: IntegrationKind,

        /// Request JSON file.
        file: PathBuf,

        /// Console configuration file.
        #[arg(long, default_value = "berth.yaml")]
        config: PathBuf,

        /// Print the plan instead of writing.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IntegrationKind {
    GitServer,
    Registry,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan { integration, file } => {
            let plan = plan_from_file(integration, &file)?;
            print_plan(&plan);
        }
        Command::Apply {
            integration,
            file,
            config,
            dry_run,
        } => {
            if dry_run {
                let plan = plan_from_file(integration, &file)?;
                print_plan(&plan);
                return Ok(());
            }

            let config = ConsoleConfig::from_file(&config)?;
            let client = match &config.cluster.kubeconfig {
                Some(path) => {
                    KubeResourceClient::from_kubeconfig(path, config.cluster.context.as_deref())
                        .await?
                }
                None => KubeResourceClient::from_inferred().await?,
            };
            let orchestrator = Orchestrator::new(client, TracingAuditSink);

            let result = match integration {
                IntegrationKind::GitServer => {
                    let request: GitServerIntegrationRequest = read_request(&file)?;
                    check_cluster(&config, &request.cluster_name)?;
                    let result = manage_git_server_integration(&orchestrator, &request).await?;
                    serde_json::to_value(result)?
                }
                IntegrationKind::Registry => {
                    let request: RegistryIntegrationRequest = read_request(&file)?;
                    check_cluster(&config, &request.cluster_name)?;
                    let result = manage_registry_integration(&orchestrator, &request).await?;
                    serde_json::to_value(result)?
                }
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

fn read_request<T: serde::de::DeserializeOwned>(file: &Path) -> anyhow::Result<T> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("failed to read request file {}", file.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse request file {}", file.display()))
}

fn plan_from_file(integration: IntegrationKind, file: &Path) -> anyhow::Result<MutationPlan> {
    let plan = match integration {
        IntegrationKind::GitServer => {
            let request: GitServerIntegrationRequest = read_request(file)?;
            build_plan(GitServerIntegration::descriptors(), request.mode, &request)?
        }
        IntegrationKind::Registry => {
            let request: RegistryIntegrationRequest = read_request(file)?;
            build_plan(RegistryIntegration::descriptors(), request.mode, &request)?
        }
    };
    Ok(plan)
}

fn print_plan(plan: &MutationPlan) {
    if plan.is_empty() {
        println!("nothing to write");
        return;
    }
    for write in plan.writes() {
        println!(
            "{} {} {}/{} ({})",
            write.verb,
            write.kind,
            write.manifest.namespace().unwrap_or("-"),
            write.manifest.name(),
            write.key
        );
    }
    println!("{} write(s) planned", plan.len());
}

fn check_cluster(config: &ConsoleConfig, requested: &str) -> anyhow::Result<()> {
    anyhow::ensure!(
        requested == config.cluster.name,
        "request addresses cluster \"{requested}\" but this console manages \"{}\"",
        config.cluster.name
    );
    Ok(())
}
