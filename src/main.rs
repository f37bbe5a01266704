use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use interlink::config::Config;
use interlink::{crawler, export, ingest, pipeline, PipelineInput, PriorityTier, VectorIndex};

#[derive(Parser)]
#[command(
    name = "interlink",
    version,
    about = "Find internal link opportunities from page embeddings and search performance."
)]
struct Cli {
    /// Config file (defaults to ~/.interlink/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the scored opportunity table
    Analyze {
        /// Internal links export (Source, Destination[, Anchor])
        #[arg(long)]
        links: PathBuf,
        /// Page embeddings export (URL + vector column, or emb_N columns)
        #[arg(long)]
        embeddings: PathBuf,
        /// Search console performance export (page, query, clicks, impressions)
        #[arg(long)]
        gsc: Option<PathBuf>,
        /// Keyword search volume table (keyword, volume)
        #[arg(long)]
        volumes: Option<PathBuf>,
        /// Related pages per target page
        #[arg(long)]
        top_related: Option<usize>,
        /// Top queries per page used for volume lookup
        #[arg(long)]
        top_keywords: Option<usize>,
        #[arg(long, value_enum, default_value = "csv")]
        format: Format,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the most similar pages to one URL
    Related {
        #[arg(long)]
        embeddings: PathBuf,
        #[arg(long)]
        url: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Fetch one page and show its headings and keyword candidates
    Fetch { url: String },
    /// Write the default config file
    Init,
}

fn config_path(cli_path: &Option<PathBuf>) -> PathBuf {
    cli_path.clone().unwrap_or_else(Config::default_path)
}

fn write_output(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("interlink=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = config_path(&cli.config);

    // Handle init before loading config (it creates the config file).
    if matches!(cli.command, Commands::Init) {
        Config::write_default_to(&path)?;
        println!("✅ Default config written to {}", path.display());
        return Ok(());
    }

    let cfg = Config::load_from(&path)?;

    match cli.command {
        Commands::Analyze {
            links,
            embeddings,
            gsc,
            volumes,
            top_related,
            top_keywords,
            format,
            out,
        } => {
            let mut params = cfg.analysis.params();
            if let Some(n) = top_related {
                params.top_related = n;
            }
            if let Some(n) = top_keywords {
                params.top_keywords = n;
            }

            let input = PipelineInput {
                links: ingest::load_links(&links)?,
                embeddings: ingest::load_embeddings(&embeddings)?,
                performance: gsc.as_deref().map(ingest::load_performance).transpose()?,
                volumes: match volumes.as_deref() {
                    Some(p) => ingest::load_volumes(p)?,
                    None => Default::default(),
                },
            };
            let analysis = pipeline::run(&input, &params)?;

            let text = match format {
                Format::Csv => export::to_csv(&analysis.rows, params.top_related)?,
                Format::Json => export::to_json(&analysis)?,
            };
            write_output(out.as_deref(), &text)?;

            let count = |tier: PriorityTier| analysis.rows.iter().filter(|r| r.priority == tier).count();
            eprintln!(
                "🔗 {} pages analysed: {} high, {} medium, {} low priority",
                analysis.rows.len(),
                count(PriorityTier::High),
                count(PriorityTier::Medium),
                count(PriorityTier::Low),
            );
            if let Some(path) = out {
                eprintln!("   Written to {}", path.display());
            }
        }
        Commands::Related {
            embeddings,
            url,
            top_k,
        } => {
            let set = ingest::load_embeddings(&embeddings)?;
            let index = VectorIndex::build(&set)?;
            let k = top_k.unwrap_or(cfg.analysis.top_related);
            let related = index.neighbors_with_scores(&url, k);
            if related.is_empty() {
                println!("🤷 No related pages found for \"{url}\".");
            } else {
                println!("🔗 Related to \"{url}\":\n");
                for (other, sim) in related {
                    println!("  {sim:.3}  {other}");
                }
            }
        }
        Commands::Fetch { url } => {
            println!("🌐 Fetching: {url}");
            let page = crawler::fetch_page_data(&cfg.fetch, &url).await?;
            println!("   {} characters of text", page.text.len());
            if !page.headings.is_empty() {
                println!("\n📑 Headings:");
                for h in &page.headings {
                    println!("  {h}");
                }
            }
            if !page.keywords.is_empty() {
                println!("\n🔑 Keywords: {}", page.keywords.join(", "));
            }
        }
        Commands::Init => unreachable!(),
    }
    Ok(())
}
