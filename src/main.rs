use adsql::{Answer, PipelineConfig, QueryPipeline};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adsql")]
#[command(about = "Answer advertising analytics questions with SQL")]
#[command(version)]
struct Args {
    /// The question in natural language
    question: String,

    /// Database URL (or set ADSQL_DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Model name (or set OPENAI_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Skip the model and answer from templates
    #[arg(long)]
    no_llm: bool,

    /// Print the executed SQL
    #[arg(long)]
    show_sql: bool,

    /// Print the whole answer as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = PipelineConfig::from_env()?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    if let Some(key) = args.api_key {
        config.api_key = Some(key);
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if args.no_llm {
        config.api_key = None;
    }

    info!("Question: {}", args.question);
    let pipeline = QueryPipeline::from_config(&config).await?;
    let answer = pipeline.answer(&args.question).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer, args.show_sql);
    }
    Ok(())
}

fn print_answer(answer: &Answer, show_sql: bool) {
    println!("\n{}", "=".repeat(80));
    println!(" {}", answer.question);
    println!("{}", "=".repeat(80));
    println!(" Source: {}", answer.provenance());
    for reason in &answer.trail {
        println!("   fallback: {}", reason);
    }
    if show_sql {
        println!("\n SQL: {}", answer.candidate.sql);
        if !answer.candidate.params.is_empty() {
            println!(" Params: {}", serde_json::json!(answer.candidate.params));
        }
    }

    let result = &answer.result;
    println!(
        "\n {} {} in {} ms\n",
        result.row_count,
        result.shape(),
        result.elapsed_ms
    );
    println!(" {}", result.columns.join(" | "));
    println!(" {}", "-".repeat(78));
    for row in result.as_rows() {
        let cells: Vec<String> = result
            .columns
            .iter()
            .map(|c| match row.get(c) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => String::new(),
            })
            .collect();
        println!(" {}", cells.join(" | "));
    }
}
