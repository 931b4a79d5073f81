use clap::{Args, Parser, Subcommand};
use php_fpm_exporter::collector::Collector;
use php_fpm_exporter::config::{ConfigLoader, ConfigOverrides};
use php_fpm_exporter::metrics::sink::PrometheusSink;
use php_fpm_exporter::server;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "php-fpm-exporter")]
#[command(version)]
#[command(about = "Prometheus exporter for php-fpm pool status", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the configuration file (JSON/YAML/TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to serve metrics on, e.g. 0.0.0.0:9090
    #[arg(long)]
    listen: Option<String>,

    /// Prefix for every metric name
    #[arg(long)]
    namespace: Option<String>,

    /// Status page URL, e.g. http://127.0.0.1/status?full
    #[arg(long)]
    http: Option<String>,

    /// FastCGI status endpoint, e.g. tcp://127.0.0.1:9000/status?full or unix:///run/php-fpm.sock
    #[arg(long)]
    fastcgi: Option<String>,
}

impl ConfigArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen_addr: self.listen.clone(),
            namespace: self.namespace.clone(),
            http_endpoint: self.http.clone(),
            fastcgi_endpoint: self.fastcgi.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve /metrics, polling the pool on every scrape
    Serve(ConfigArgs),
    /// Validate the configuration and show the resolved endpoint
    Check(ConfigArgs),
    /// Run a single collection cycle and print the exposition
    Scrape(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            log::info!("Loading config from {:?}", args.config);
            let config = ConfigLoader::load(args.config.as_deref(), &args.overrides())?;
            let collector = Arc::new(Collector::from_config(&config)?);
            server::serve(&config, collector).await?;
        }
        Commands::Check(args) => {
            match ConfigLoader::load(args.config.as_deref(), &args.overrides()) {
                Ok(cfg) => {
                    println!("✅ Config is valid:");
                    println!("   Listen: {}", cfg.listen_addr);
                    println!("   Endpoint: {}", cfg.endpoint()?);
                    println!("{}", serde_json::to_string_pretty(&cfg)?);
                }
                Err(e) => {
                    eprintln!("❌ Config error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Scrape(args) => {
            let config = ConfigLoader::load(args.config.as_deref(), &args.overrides())?;
            let collector = Collector::from_config(&config)?;

            let mut sink = PrometheusSink::new();
            collector.register(&mut sink)?;
            let up = collector.collect(&mut sink).await;
            print!("{}", sink.encode()?);

            if !up {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
