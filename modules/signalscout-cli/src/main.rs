//! Operator CLI for the profile scouting pipeline.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use signalscout_common::Config;
use signalscout_pipeline::classify::run_classify;
use signalscout_pipeline::enrich::{run_enrich, XApiEnricher};
use signalscout_pipeline::export::run_export;
use signalscout_pipeline::filter::run_filter;
use signalscout_pipeline::llm::DeepSeekClient;
use signalscout_pipeline::mine::{generate_topics, run_mine, ManualSource};
use signalscout_pipeline::score::run_score;
use signalscout_pipeline::traits::ChatModel;
use signalscout_state::{PipelineState, Stage};

#[derive(Parser)]
#[command(name = "signalscout", about = "Profile scouting pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pipeline progress and topic registry
    Status,

    /// Manage mining topics
    #[command(subcommand)]
    Topics(TopicsCommand),

    /// Mine profiles from handles supplied by the operator
    Mine {
        /// Topic the handles were found under
        #[arg(long)]
        topic: String,

        /// Handles, @handles, or profile URLs
        handles: Vec<String>,
    },

    /// Enrich mined profiles via the X API
    Enrich {
        /// Cap the batch size
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Filter enriched profiles on followers and activity
    Filter,

    /// Score filtered profiles (LLM eval needs DEEPSEEK_KEY)
    Score {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Classify scored profiles into persona categories
    Classify {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Export ranked results to results.json and results.csv
    Export,

    /// Run filter, score, classify, and export back to back
    Run {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Reset stage marks so profiles rerun through that stage
    Reset {
        /// Stage to clear: mined, enriched, filtered, scored, classified, exported
        stage: String,

        /// Clear only this handle instead of the whole stage
        #[arg(long)]
        handle: Option<String>,
    },

    /// Remove a profile from tracking entirely
    Remove { handle: String },
}

#[derive(Subcommand)]
enum TopicsCommand {
    /// List the topic registry
    List,
    /// Add a pending topic
    Add { name: String },
    /// Remove a topic
    Remove { name: String },
    /// Generate topic ideas with the LLM and park them as pending
    Generate {
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
}

fn chat_client(config: &Config) -> Option<DeepSeekClient> {
    config.deepseek_api_key.as_ref().map(|key| {
        DeepSeekClient::new(key, &config.deepseek_url, &config.deepseek_model)
    })
}

fn enricher(config: &Config) -> Result<XApiEnricher> {
    match &config.x_bearer_token {
        Some(token) => Ok(XApiEnricher::new(token, config.max_posts_to_fetch)),
        None => bail!("X_BEARER_TOKEN is not set; enrichment needs X API access"),
    }
}

fn print_status(state: &PipelineState) {
    let summary = state.summary();
    println!("Profiles tracked: {}", summary.total_profiles);
    for (stage, count) in &summary.stage_counts {
        let last = summary
            .last_run
            .get(stage)
            .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("  {stage:<12} {count:>5}   last batch: {last}");
    }
    println!(
        "Topics: {} ({} completed)",
        summary.topics_total, summary.topics_completed
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let mut state = PipelineState::open(config.state_file());

    match cli.command {
        Commands::Status => print_status(&state),

        Commands::Topics(cmd) => match cmd {
            TopicsCommand::List => {
                for (name, record) in state.topics() {
                    println!("{name}: {} ({} profiles)", record.status, record.results);
                }
            }
            TopicsCommand::Add { name } => {
                state.add_topic(&name)?;
                info!(topic = name.as_str(), "Topic added");
            }
            TopicsCommand::Remove { name } => {
                state.remove_topic(&name)?;
                info!(topic = name.as_str(), "Topic removed");
            }
            TopicsCommand::Generate { count } => {
                let Some(chat) = chat_client(&config) else {
                    bail!("DEEPSEEK_KEY is not set; topic generation needs the LLM");
                };
                let topics = generate_topics(&chat, count).await?;
                for topic in &topics {
                    state.add_topic(topic)?;
                    println!("{topic}");
                }
            }
        },

        Commands::Mine { topic, handles } => {
            if handles.is_empty() {
                bail!("no handles given");
            }
            let source = ManualSource::new(handles);
            let outcome = run_mine(&mut state, &config, &source, &[topic]).await?;
            println!("Added {}, skipped {}", outcome.added, outcome.skipped);
        }

        Commands::Enrich { limit } => {
            let enricher = enricher(&config)?;
            let outcome = run_enrich(&mut state, &config, &enricher, limit).await?;
            println!("Enriched {}, failed {}", outcome.enriched, outcome.failed);
        }

        Commands::Filter => {
            let outcome = run_filter(&mut state, &config)?;
            println!(
                "Passed {}, dropped {}",
                outcome.passed.len(),
                outcome.dropped.len()
            );
        }

        Commands::Score { limit } => {
            let chat = chat_client(&config);
            let chat_ref = chat.as_ref().map(|c| c as &dyn ChatModel);
            let outcome = run_score(&mut state, &config, chat_ref, limit).await?;
            println!("Scored {} ({} total)", outcome.scored, outcome.total_scored);
        }

        Commands::Classify { limit } => {
            let chat = chat_client(&config);
            let chat_ref = chat.as_ref().map(|c| c as &dyn ChatModel);
            let outcome = run_classify(&mut state, &config, chat_ref, limit).await?;
            println!(
                "Classified {} ({} total)",
                outcome.classified, outcome.total_classified
            );
        }

        Commands::Export => {
            let outcome = run_export(&mut state, &config)?;
            println!("Exported {}", outcome.exported);
        }

        Commands::Run { limit } => {
            let chat = chat_client(&config);
            let chat_ref = chat.as_ref().map(|c| c as &dyn ChatModel);

            run_filter(&mut state, &config)?;
            run_score(&mut state, &config, chat_ref, limit).await?;
            run_classify(&mut state, &config, chat_ref, limit).await?;
            run_export(&mut state, &config)?;
            print_status(&state);
        }

        Commands::Reset { stage, handle } => {
            let stage: Stage = stage.parse()?;
            match handle {
                Some(handle) => {
                    state.reset_profile_stage(&handle, stage)?;
                    info!(handle = handle.as_str(), %stage, "Profile stage reset");
                }
                None => {
                    state.reset_stage(stage)?;
                    info!(%stage, "Stage reset");
                }
            }
        }

        Commands::Remove { handle } => {
            state.remove_profile(&handle)?;
            info!(handle = handle.as_str(), "Profile removed from tracking");
        }
    }

    Ok(())
}
