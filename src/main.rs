mod assemble;
mod config;
mod cut;
mod detect;
mod dimensions;
mod enrich;
mod normalize;
mod order;
mod order_store;
mod pdf_extract;
mod reference;

use assemble::{Assembler, OrderOutput};
use config::{Config, LlmBackend, LlmSection};
use enrich::LlmEnricher;
use order::{Article, OrderHeader};
use order_store::{OrderStore, StoredOrder};
use reference::ReferenceTables;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = ".config/literie.toml";

const USAGE: &str = "usage: literie_orders <command>

commands:
  process <pdf>...   read purchase-order PDFs, store and print their records
  text <file>        run the pipeline on a plain-text order export
  show <uid>         print the stored records of an order
  stats              store statistics";

#[derive(Serialize)]
struct OrderReport<'a> {
    source: &'a str,
    uid: Option<&'a str>,
    header: &'a OrderHeader,
    #[serde(flatten)]
    output: &'a OrderOutput,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing, stdout is kept for JSON
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{USAGE}");
        return Ok(());
    };

    let config_path = std::env::var("LITERIE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.into());
    let cfg = Config::load_or_default(&config_path)?;

    match (command.as_str(), rest) {
        ("process", paths) if !paths.is_empty() => process_pdfs(&cfg, paths).await,
        ("text", [path]) => process_text(&cfg, path).await,
        ("show", [uid]) => show_order(&cfg, uid),
        ("stats", []) => print_stats(&cfg),
        _ => {
            eprintln!("{USAGE}");
            Ok(())
        }
    }
}

fn open_store(cfg: &Config) -> Result<OrderStore, Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(&cfg.db_path).parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OrderStore::new(&cfg.db_path)?)
}

/// Connect to the configured model, or `None` for pattern-only runs.
async fn build_enricher(llm: &LlmSection) -> Option<LlmEnricher> {
    if llm.backend == LlmBackend::Heuristics {
        return None;
    }
    match LlmEnricher::connect(llm).await {
        Ok(enricher) => Some(enricher),
        Err(e) => {
            warn!(error = %e, "LLM enrichment unavailable, using patterns only");
            None
        }
    }
}

async fn run_pipeline(
    assembler: &Assembler<'_>,
    articles: &[Article],
    enricher: Option<&LlmEnricher>,
    timeout: Duration,
) -> OrderOutput {
    match enricher {
        Some(enricher) => enrich::assemble_enriched(assembler, articles, enricher, timeout).await,
        None => assembler.assemble(articles),
    }
}

fn print_report(report: &OrderReport<'_>) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn process_pdfs(cfg: &Config, paths: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = open_store(cfg)?;
    let tables = ReferenceTables::load(&cfg.reference_dir);
    let assembler = Assembler::new(&tables, &cfg.display.core_type_order);
    let enricher = build_enricher(&cfg.llm).await;
    let timeout = Duration::from_secs(cfg.llm.timeout_secs);

    let mut processed = 0usize;
    for path in paths {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path, error = %e, "Cannot read file, skipping");
                continue;
            }
        };

        let uid = OrderStore::generate_uid(&bytes);
        if store.is_known(&uid)? {
            info!(path = %path, uid = %uid, "Already processed, skipping");
            continue;
        }

        let text = match pdf_extract::extract_text_from_pdf(&bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path, error = %e, "No usable text, skipping");
                continue;
            }
        };

        let parsed = order::read_order(&text);
        let (found, total) = parsed.header.coverage();
        info!(
            path = %path,
            articles = parsed.articles.len(),
            header = format!("{found}/{total}"),
            "Order read"
        );

        let output = run_pipeline(&assembler, &parsed.articles, enricher.as_ref(), timeout).await;

        let filename = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let stored = StoredOrder::new(
            uid.clone(),
            filename,
            &parsed.header,
            output.records.len(),
            output.excluded.len(),
        );
        store.save_order(&stored, &output.records)?;

        print_report(&OrderReport {
            source: path,
            uid: Some(uid.as_str()),
            header: &parsed.header,
            output: &output,
        })?;
        processed += 1;
    }

    info!(files = paths.len(), processed, "Run complete");
    Ok(())
}

async fn process_text(cfg: &Config, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let tables = ReferenceTables::load(&cfg.reference_dir);
    let assembler = Assembler::new(&tables, &cfg.display.core_type_order);
    let enricher = build_enricher(&cfg.llm).await;
    let timeout = Duration::from_secs(cfg.llm.timeout_secs);

    let parsed = order::read_order(&text);
    let output = run_pipeline(&assembler, &parsed.articles, enricher.as_ref(), timeout).await;

    print_report(&OrderReport {
        source: path,
        uid: None,
        header: &parsed.header,
        output: &output,
    })?;
    Ok(())
}

fn show_order(cfg: &Config, uid: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(cfg)?;
    let Some(order) = store.get_order(uid)? else {
        warn!(uid = %uid, "Unknown order");
        return Ok(());
    };
    info!(
        uid = %order.uid,
        filename = %order.filename,
        order_no = ?order.order_no,
        customer = ?order.customer,
        records = order.record_count,
        excluded = order.excluded_count,
        "Stored order"
    );

    let records = store
        .records_for_order(uid)?
        .into_iter()
        .map(|(_, payload)| serde_json::from_str(&payload))
        .collect::<Result<Vec<serde_json::Value>, _>>()?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn print_stats(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(cfg)?;
    let (orders, records, per_core) = store.get_counts()?;
    info!(orders_total = orders, records_total = records, "Database statistics");
    for (core_type, count) in per_core {
        println!("{core_type:<32} {count}");
    }
    Ok(())
}
