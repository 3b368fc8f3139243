//! Notion task runner - main entry point

use clap::{Parser, Subcommand};
use notion_taskrunner::config::TaskRunnerConfig;
use notion_taskrunner::dispatcher::{
    wait_for_signal, DispatchSettings, Poller, Shutdown, TaskDispatcher,
};
use notion_taskrunner::handlers::research::{ResearchLimits, ResearchPipeline, SerperSearch};
use notion_taskrunner::handlers::{
    DefaultCompletion, HandlerKind, HandlerRegistry, TaskHandler, TaskRouter,
};
use notion_taskrunner::llm::providers::{OpenAiConfig, OpenAiProvider};
use notion_taskrunner::llm::{LlmProvider, ModelSettings};
use notion_taskrunner::notion::{DocumentStore, NotionClient, NotionClientConfig};
use notion_taskrunner::observability::{init_default_logging, HealthServer};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Process Notion database tasks with LLM handlers
#[derive(Parser)]
#[command(name = "notion-taskrunner")]
#[command(about = "Process Notion database tasks with LLM handlers")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the database and process pages
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Verify Notion and LLM provider access
    Check,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting notion-taskrunner v{}", env!("CARGO_PKG_VERSION"));

    let config = match TaskRunnerConfig::discover(cli.config.as_deref()) {
        Ok((config, path)) => {
            info!("Loaded configuration from: {}", path.display());
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { once } => run(config, once).await,
        Commands::Check => check(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Shutdown complete");
}

async fn run(config: TaskRunnerConfig, once: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = StoreFactory::create(&config)?;
    let llm = LlmProviderFactory::create_provider(&config)?;
    let handler = HandlerFactory::create(&config, llm)?;

    let dispatcher = TaskDispatcher::new(
        store,
        handler,
        DispatchSettings {
            title_property: config.notion.title_property.clone(),
            statuses: config.notion.statuses.clone(),
            handler_timeout: config.poller.handler_timeout(),
            chunk_size: config.content.chunk_size,
        },
    );
    let poller = Poller::new(
        Arc::new(dispatcher),
        config.poller.interval(),
        config.poller.error_backoff(),
    );

    if once {
        let report = poller.run_once().await?;
        println!("{report}");
        for page in report.pages() {
            println!(
                "  {} {:?}: {:?}",
                page.page_id,
                page.title.as_deref().unwrap_or(""),
                page.outcome
            );
        }
        return Ok(());
    }

    if let Some(health) = &config.health {
        let server = HealthServer::new(
            health.port,
            config.poller.interval(),
            config.poller.handler_timeout(),
        );
        tokio::spawn(server.start());
    }

    let shutdown: Arc<Shutdown> = poller.shutdown().clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutting down after the current page");
        shutdown.trigger();
    });

    poller.run().await;
    Ok(())
}

async fn check(config: TaskRunnerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = StoreFactory::create(&config)?;
    let llm = LlmProviderFactory::create_provider(&config)?;

    store.ping().await?;
    println!("Notion database {}: ok", config.notion.database_id);

    llm.health_check().await?;
    println!("LLM provider {}: ok", llm.name());

    match config.get_search_api_key() {
        Some(Ok(_)) => println!("Research handler: enabled"),
        Some(Err(e)) => println!("Research handler: misconfigured ({e})"),
        None => println!("Research handler: disabled"),
    }
    Ok(())
}

fn handle_config_command(
    config: TaskRunnerConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", config.to_toml_string()?);
    }

    info!("Configuration validation complete");
    Ok(())
}

/// Document store from the `[notion]` section
struct StoreFactory;

impl StoreFactory {
    fn create(config: &TaskRunnerConfig) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
        let notion = &config.notion;
        let client = NotionClient::new(NotionClientConfig {
            api_key: config.get_notion_api_key()?,
            base_url: notion.base_url.clone(),
            notion_version: notion.notion_version.clone(),
            database_id: notion.database_id.clone(),
            status_property: notion.status_property.clone(),
            response_property: notion.response_property.clone(),
            ..Default::default()
        })?;
        Ok(Arc::new(client))
    }
}

/// LLM provider from the `[llm]` section
struct LlmProviderFactory;

impl LlmProviderFactory {
    fn create_provider(
        config: &TaskRunnerConfig,
    ) -> Result<Arc<dyn LlmProvider>, Box<dyn std::error::Error>> {
        match config.llm.provider.as_str() {
            "openai" => {
                let mut openai_config = OpenAiConfig {
                    api_key: config.get_llm_api_key()?,
                    ..Default::default()
                };
                if let Some(base_url) = &config.llm.base_url {
                    openai_config.base_url = base_url.clone();
                }
                Ok(Arc::new(OpenAiProvider::new(openai_config)?))
            }
            provider => Err(format!("Unsupported LLM provider: {provider}").into()),
        }
    }
}

/// Handler registry: router, default completion and research when configured
struct HandlerFactory;

impl HandlerFactory {
    fn create(
        config: &TaskRunnerConfig,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Arc<dyn TaskHandler>, Box<dyn std::error::Error>> {
        let settings = ModelSettings {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        };

        let router = TaskRouter::new(llm.clone(), settings.clone());
        let default = Arc::new(DefaultCompletion::new(llm.clone(), settings.clone()));
        let mut registry = HandlerRegistry::new(router, default);

        match (&config.research, config.get_search_api_key()) {
            (Some(research), Some(Ok(api_key))) => {
                let search = SerperSearch::new(api_key, &research.search_url, research.max_results)?;
                let pipeline = ResearchPipeline::new(
                    llm,
                    Arc::new(search),
                    settings,
                    ResearchLimits {
                        max_queries: research.max_queries,
                        max_results: research.max_results,
                    },
                );
                registry = registry.register(HandlerKind::Research, Arc::new(pipeline));
                info!("Research handler enabled");
            }
            (Some(_), Some(Err(e))) => {
                warn!(error = %e, "Research handler disabled");
            }
            _ => info!("Research handler not configured"),
        }

        info!(handlers = ?registry.kinds(), "Handler registry ready");
        Ok(Arc::new(registry))
    }
}
