use std::{path::PathBuf, time::Duration};

use api_mock::{probe, rule::DEFAULT_HCLOUD_TOKEN, Registrar};
use api_mock_mockserver::MockServerClient;
use clap::Parser;
use reqwest::Client;

#[derive(Parser, Debug, Clone)]
#[clap(name = "api-mock-init", version)]
/// Reset a MockServer instance and register the Hetzner Cloud metadata and
/// API fixtures on it
pub struct InitArgs {
    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Base URL of the MockServer instance
    #[clap(long, env = "MOCKSERVER_URL", default_value = "http://hcloud:80")]
    mockserver_url: String,

    /// Directory holding the fixture files
    #[clap(long, env = "FIXTURES_DIR", default_value = "fixtures")]
    fixtures_dir: PathBuf,

    /// Token the simulated API expects as bearer authorization
    #[clap(long, env = "HCLOUD_TOKEN", default_value = DEFAULT_HCLOUD_TOKEN)]
    hcloud_token: String,

    /// Request timeout in seconds, unbounded when unset
    #[clap(long)]
    timeout: Option<u64>,

    /// Check the number of active expectations after registration
    #[clap(long)]
    verify: bool,

    /// Replay every registered matcher against the mock server
    #[clap(long)]
    probe: bool,

    /// Instance id served by the metadata service
    instance_id: Option<String>,
}

impl InitArgs {
    fn client(&self) -> anyhow::Result<Client> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        Ok(builder.build()?)
    }
}

async fn run(args: InitArgs) -> anyhow::Result<()> {
    let client = args.client()?;
    let control = MockServerClient::with_client(client.clone(), &args.mockserver_url)?;
    let registrar = Registrar::new(control, &args.fixtures_dir).token(&args.hcloud_token);
    log::debug!("Reading fixtures from {}", registrar.fixtures_dir().display());

    let report = registrar.run(args.instance_id.as_deref()).await?;
    if args.verify {
        registrar.verify(&report).await?;
    }
    if args.probe {
        probe(&client, registrar.control().base_url(), &report.expectations).await?;
    }

    log::info!(
        "Mock server at {} is ready.",
        registrar.control().base_url()
    );
    Ok(())
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() {
    let args = InitArgs::parse();
    init_logger(args.verbose);

    if let Err(e) = run(args).await {
        // the invoking harness reads stdout
        println!("Error: {e:#}");
        std::process::exit(1);
    }
}
