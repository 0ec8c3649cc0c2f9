//! PartScout CLI entry point

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use partscout::cli::{Args, Commands};
use partscout::config::Config;
use partscout::context::{ContextAssembler, GroundingGate};
use partscout::doctor;
use partscout::embedding::CandleEmbedder;
use partscout::generation::{Generator, OllamaGenerator};
use partscout::ingest::{dedup_urls, rows_from_csv, DocumentPipeline, GraphLoader};
use partscout::query::{Intent, QueryParser};
use partscout::retrieval::HybridRetriever;
use partscout::store::graph::Neo4jEntityStore;
use partscout::store::vector::QdrantChunkStore;
use partscout::telemetry::{TelemetryCollector, TelemetryEvent};
use partscout::EngineError;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let verbose = args.verbose > 0;

    match args.command {
        Commands::Ingest {
            csv,
            skip_documents,
        } => run_ingest(&config, &csv, skip_documents, verbose).await,
        Commands::Query { text, context_only } => {
            run_query(&config, &text.join(" "), context_only, verbose).await
        }
        Commands::Doctor => run_doctor(&config).await,
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn graph_password() -> String {
    std::env::var("NEO4J_PASSWORD").unwrap_or_default()
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn run_ingest(
    config: &Config,
    csv: &Path,
    skip_documents: bool,
    verbose: bool,
) -> Result<()> {
    let telemetry = TelemetryCollector::new();
    let rows = rows_from_csv(csv)?;
    println!(
        "{} {} rows read from {}",
        "→".cyan(),
        rows.len(),
        csv.display()
    );

    let entities = Arc::new(
        Neo4jEntityStore::connect(
            &config.stores.graph_uri,
            &config.stores.graph_user,
            &graph_password(),
        )
        .await?,
    );
    let loader = GraphLoader::new(entities);

    // Pair every part with each of its manual URLs, then collapse to
    // unique URLs before scheduling.
    let mut pairs = Vec::new();
    for row in &rows {
        if let Some(part_id) = &row.part_id {
            for url in &row.manual_urls {
                pairs.push((part_id.trim().to_string(), url.clone()));
            }
        }
    }
    let url_map = dedup_urls(pairs);

    let pb = spinner("loading entities and processing manuals...");

    if skip_documents || url_map.is_empty() {
        let load_report = loader.load(&rows).await?;
        pb.finish_and_clear();
        print_load_report(&load_report);
        if url_map.is_empty() && !skip_documents {
            println!("{} no manual URLs found in input", "→".cyan());
        }
    } else {
        let chunk_store = Arc::new(
            QdrantChunkStore::connect(
                &config.stores.vector_url,
                &config.stores.collection,
                partscout::embedding::engine::EMBEDDING_DIM,
            )
            .await?,
        );
        let embedder = Arc::new(CandleEmbedder::new()?);
        let pipeline = DocumentPipeline::new(
            &config.ingestion,
            embedder,
            chunk_store,
            telemetry.clone(),
        )?;

        // Entity loading and document processing share no mutable state
        // and run concurrently.
        let (load_result, pipe_result) =
            tokio::join!(loader.load(&rows), pipeline.process(&url_map));
        pb.finish_and_clear();

        let load_report = load_result?;
        let pipe_report = pipe_result?;
        print_load_report(&load_report);

        println!(
            "{} {} manuals processed, {} failed, {} chunks stored ({} failed)",
            "✓".green(),
            pipe_report.urls_processed,
            pipe_report.urls_failed,
            pipe_report.chunks_stored,
            pipe_report.chunks_failed
        );
        for failure in &pipe_report.failures {
            println!(
                "  {} {} [{}]: {}",
                "✗".red(),
                failure.url,
                failure.stage,
                failure.reason
            );
        }
    }

    if verbose {
        let stats = telemetry.stats();
        println!(
            "{} telemetry: {} scheduled, {} fetched, {} failed, {} chunks in {:.1}s",
            "→".cyan(),
            stats.urls_scheduled,
            stats.urls_fetched,
            stats.urls_failed,
            stats.chunks_stored,
            telemetry.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

fn print_load_report(report: &partscout::ingest::LoadReport) {
    println!(
        "{} {} rows loaded, {} rejected, {} parts, {} models",
        "✓".green(),
        report.rows_processed,
        report.rows_rejected,
        report.parts_touched,
        report.models_touched
    );
    for rejection in &report.rejections {
        println!(
            "  {} row {}: {}",
            "✗".red(),
            rejection.row_number,
            rejection.reason
        );
    }
    for failure in &report.failures {
        println!("  {} {}", "✗".red(), failure);
    }
}

async fn run_query(
    config: &Config,
    text: &str,
    context_only: bool,
    verbose: bool,
) -> Result<()> {
    let telemetry = TelemetryCollector::new();
    let parser = QueryParser::new()?;
    let parsed = parser.parse(text);
    telemetry.record(TelemetryEvent::QueryParsed {
        intent: parsed.intent.to_string(),
        timestamp: Instant::now(),
    });

    if verbose {
        println!(
            "{} intent {} | parts {:?} | models {:?}",
            "→".cyan(),
            parsed.intent,
            parsed.part_ids,
            parsed.model_ids
        );
    }

    if parsed.intent == Intent::Unknown {
        println!(
            "{}",
            "I could not find a part number or model identifier in that question. \
             Please include one, for example \"price of TRNBRG00104\" or \
             \"parts for model TUD-123\"."
                .yellow()
        );
        return Ok(());
    }

    let entities = Arc::new(
        Neo4jEntityStore::connect(
            &config.stores.graph_uri,
            &config.stores.graph_user,
            &graph_password(),
        )
        .await?,
    );
    let chunks = Arc::new(
        QdrantChunkStore::connect(
            &config.stores.vector_url,
            &config.stores.collection,
            partscout::embedding::engine::EMBEDDING_DIM,
        )
        .await?,
    );
    let embedder = Arc::new(CandleEmbedder::new()?);

    let retriever = HybridRetriever::new(
        entities,
        chunks,
        embedder,
        config.retrieval.clone(),
        telemetry.clone(),
    );

    let pb = spinner("retrieving...");
    let retrieval = retriever.retrieve(&parsed).await?;
    pb.finish_and_clear();

    let bundle = ContextAssembler::new().assemble(&retrieval);

    if context_only {
        print!("{}", bundle.render());
        return Ok(());
    }

    let generator = OllamaGenerator::new(&config.generation)?;
    let pb = spinner("generating answer...");
    let answer = generator.generate(&bundle).await?;
    pb.finish_and_clear();

    let gate = GroundingGate::new()?;
    match gate.check(&bundle, &answer) {
        Ok(()) => {
            println!("{answer}");
            if !bundle.citable_urls.is_empty() {
                println!();
                println!("{} {}", "Sources:".cyan(), bundle.citable_urls.join(", "));
            }
        }
        Err(EngineError::GroundingViolation(reason)) => {
            telemetry.record(TelemetryEvent::ResponseWithheld {
                reason: reason.clone(),
                timestamp: Instant::now(),
            });
            println!(
                "{}",
                "The generated answer referenced information outside the retrieved \
                 sources and was withheld."
                    .yellow()
            );
            if verbose {
                println!("{} {}", "→".cyan(), reason);
            }
        }
        Err(e) => return Err(e.into()),
    }

    if verbose {
        let stats = telemetry.stats();
        println!(
            "{} telemetry: {} searches, {} chunks discarded, {} withheld",
            "→".cyan(),
            stats.vector_searches,
            stats.chunks_discarded,
            stats.responses_withheld
        );
    }

    Ok(())
}

async fn run_doctor(config: &Config) -> Result<()> {
    println!("{}", "Running connectivity checks...".cyan());
    let outcomes = doctor::run_checks(config, &graph_password()).await;

    let mut all_ok = true;
    for outcome in &outcomes {
        let mark = if outcome.ok {
            "✓".green()
        } else {
            all_ok = false;
            "✗".red()
        };
        println!("{mark} {}: {}", outcome.name, outcome.detail);
    }

    if !all_ok {
        anyhow::bail!("one or more checks failed");
    }
    Ok(())
}
