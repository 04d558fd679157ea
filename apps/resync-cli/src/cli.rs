use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use resync_core::report::{EXIT_FAILED, EXIT_OK};
use resync_core::validation::validate_identifier;
use resync_core::{FleetReport, ResyncState};
use resync_engine::config::{EndpointSettings, FunctionSettings};
use resync_engine::{
    EngineError, FleetOrchestrator, FunctionAsset, FunctionDeployer, HttpEndpointClient,
    RemoteEndpointClient, ResyncConfig, ResyncStateMachine,
};

#[derive(Parser)]
#[command(name = "resync")]
#[command(about = "Pause, resync and resume app endpoints", version)]
pub struct Cli {
    /// Config file (default: platform config dir, resync.toml)
    #[arg(short, long, global = true, env = "RESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy access functions, then resync every selected endpoint
    Run {
        /// Restrict to these endpoints (repeatable)
        #[arg(short, long = "endpoint")]
        endpoints: Vec<String>,

        /// Resync without deploying functions first
        #[arg(long)]
        skip_deploy: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Deploy access functions only
    Deploy {
        #[arg(short, long = "endpoint")]
        endpoints: Vec<String>,
    },
    /// Show the current resync state of an endpoint
    Status { endpoint: String },
    /// Pause an endpoint
    Pause { endpoint: String },
    /// Resume an endpoint, e.g. after a failed automatic resume
    Resume { endpoint: String },
    /// Write a config file template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Executes the command and returns the process exit status.
    pub async fn run(self, cancel: CancellationToken) -> Result<i32> {
        match self.command {
            Command::Run {
                ref endpoints,
                skip_deploy,
                json,
            } => self.resync(endpoints, skip_deploy, json, &cancel).await,
            Command::Deploy { ref endpoints } => self.deploy(endpoints, &cancel).await,
            Command::Status { ref endpoint } => self.status(endpoint).await,
            Command::Pause { ref endpoint } => self.pause(endpoint).await,
            Command::Resume { ref endpoint } => self.resume(endpoint).await,
            Command::Init { force } => self.init(force),
        }
    }

    fn load(&self) -> Result<(ResyncConfig, Arc<HttpEndpointClient>)> {
        let config = ResyncConfig::load(self.config.clone()).context("loading configuration")?;
        let client = HttpEndpointClient::new(config.connection.clone(), &config.http)?;
        Ok((config, Arc::new(client)))
    }

    async fn resync(
        &self,
        names: &[String],
        skip_deploy: bool,
        json: bool,
        cancel: &CancellationToken,
    ) -> Result<i32> {
        let (config, client) = self.load()?;
        let selected = config.select_endpoints(names)?;
        let descriptors: Vec<_> = selected.iter().map(|e| e.descriptor()).collect();

        let machine = ResyncStateMachine::new(client.clone(), config.poll_policy());
        let orchestrator = FleetOrchestrator::new(machine);

        let report = if skip_deploy {
            orchestrator.resync_fleet(&descriptors, cancel).await
        } else {
            let assets = FunctionAsset::from_config(&config, &selected);
            let deployer = FunctionDeployer::new(client);
            orchestrator
                .deploy_then_resync(&deployer, &assets, &descriptors, cancel)
                .await
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }

        Ok(report.exit_code())
    }

    async fn deploy(&self, names: &[String], cancel: &CancellationToken) -> Result<i32> {
        let (config, client) = self.load()?;
        let selected = config.select_endpoints(names)?;
        let assets = FunctionAsset::from_config(&config, &selected);

        if assets.is_empty() {
            println!("No functions configured");
            return Ok(EXIT_OK);
        }

        let outcomes = FunctionDeployer::new(client)
            .deploy_all(&assets, cancel)
            .await;

        for outcome in &outcomes {
            print_deploy(outcome);
        }

        let complete = outcomes.len() == assets.len();
        Ok(if complete && outcomes.iter().all(|o| o.deployed) {
            EXIT_OK
        } else {
            EXIT_FAILED
        })
    }

    async fn status(&self, endpoint: &str) -> Result<i32> {
        validate_identifier("endpoint", endpoint)?;
        let (_, client) = self.load()?;

        let report = client.resync_status(endpoint).await?;
        let state = ResyncState::from_remote(report.state.as_deref());

        println!(
            "{}: {} ({})",
            endpoint,
            report.state.as_deref().unwrap_or("unknown"),
            state
        );
        for (key, value) in &report.details {
            println!("  {}: {}", key, value);
        }
        Ok(EXIT_OK)
    }

    async fn pause(&self, endpoint: &str) -> Result<i32> {
        validate_identifier("endpoint", endpoint)?;
        let (_, client) = self.load()?;
        client.pause(endpoint).await?;
        println!("{}: paused", endpoint);
        Ok(EXIT_OK)
    }

    async fn resume(&self, endpoint: &str) -> Result<i32> {
        validate_identifier("endpoint", endpoint)?;
        let (_, client) = self.load()?;
        client.resume(endpoint).await?;
        println!("{}: resumed", endpoint);
        Ok(EXIT_OK)
    }

    fn init(&self, force: bool) -> Result<i32> {
        let path = match self.config.clone().or_else(ResyncConfig::default_config_path) {
            Some(path) => path,
            None => bail!("No config directory available, pass --config"),
        };

        if path.exists() && !force {
            bail!(
                "{} already exists, use --force to overwrite",
                path.display()
            );
        }

        let written = template().save(Some(path))?;
        info!(path = %written.display(), "Config template written");
        println!("Wrote {}", written.display());
        Ok(EXIT_OK)
    }
}

/// Points the operator at the config sources when `err` is a configuration problem.
pub fn with_config_hint(err: anyhow::Error) -> anyhow::Error {
    match err.downcast_ref::<EngineError>() {
        Some(e) if e.is_config_error() => err.context(
            "Configuration problem: check --config, the RESYNC_* variables, or run `resync init`",
        ),
        _ => err,
    }
}

/// A config with one example endpoint for the operator to fill in.
fn template() -> ResyncConfig {
    let mut config = ResyncConfig::default();
    config.endpoints.push(EndpointSettings {
        name: "my-endpoint".into(),
        scope: "my-scope".into(),
        resync_collections: vec!["my-collection".into()],
        functions: vec![FunctionSettings {
            collection: "my-collection".into(),
            file: PathBuf::from("functions/my-collection.js"),
        }],
    });
    config
}

fn print_deploy(outcome: &resync_core::DeployOutcome) {
    match &outcome.error {
        None => println!(
            "deployed {}.{}.{}",
            outcome.endpoint, outcome.scope, outcome.collection
        ),
        Some(error) => println!(
            "FAILED   {}.{}.{}: {}",
            outcome.endpoint, outcome.scope, outcome.collection, error
        ),
    }
}

fn print_report(report: &FleetReport) {
    for deploy in &report.deploys {
        print_deploy(deploy);
    }
    for outcome in &report.outcomes {
        println!("{}", outcome);
    }

    println!(
        "{} of {} endpoint(s) completed in {:.1}s",
        report.completed().count(),
        report.outcomes.len(),
        report.elapsed().as_secs_f64()
    );

    let paused: Vec<&str> = report
        .left_paused()
        .map(|o| o.endpoint_name.as_str())
        .collect();
    if !paused.is_empty() {
        println!(
            "MANUAL ACTION REQUIRED: resume {} with `resync resume <ENDPOINT>`",
            paused.join(", ")
        );
    }
}
