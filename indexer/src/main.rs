use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use placesearch_core::engine::{Engine, Model, Retrieval, RetrievalRequest};
use placesearch_core::eval::{average_precision, mean_average_precision, precision_recall_f1, GoldSet, DEFAULT_CUTOFF};
use placesearch_core::persist::{load_snapshot, save_snapshot, IndexPaths};
use placesearch_core::tokenizer::{LexiconNormalizer, Normalizer};
use placesearch_core::vsm::WeightingScheme;
use placesearch_core::{DocId, IndexBuilder, PlaceInfo, SourceDoc};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One review as it appears in the input files.
#[derive(Debug, Deserialize)]
struct InputReview {
    place: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    rating: f64,
    #[serde(default)]
    text: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, query and evaluate the place review index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from review JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// JSON array of static place info (photos, prices, facilities)
        #[arg(long)]
        places: Option<String>,
        /// Normalizer lexicon (phrases, regions, intents) as JSON
        #[arg(long)]
        lexicon: Option<String>,
    },
    /// Run one query against a built index
    Search {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        lexicon: Option<String>,
        /// Retrieval model: boolean or vsm
        #[arg(long)]
        model: Model,
        #[arg(long)]
        query: String,
        /// Number of ranked results to print (vsm only)
        #[arg(long, default_value_t = 5)]
        k: usize,
        /// Weighting scheme: raw-tfidf or sublinear
        #[arg(long, default_value_t = WeightingScheme::RawTfIdf)]
        scheme: WeightingScheme,
    },
    /// Score both models against a gold relevance set
    Eval {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        lexicon: Option<String>,
        /// JSON file: {"queries": [{query_id, query_text, relevant_docs}]}
        #[arg(long)]
        gold: String,
        /// Rank cutoff for average precision
        #[arg(long, default_value_t = DEFAULT_CUTOFF)]
        k: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, places, lexicon } => {
            build_index(&input, &output, places.as_deref(), lexicon.as_deref())
        }
        Commands::Search { index, lexicon, model, query, k, scheme } => {
            let engine = open_engine(&index, lexicon.as_deref())?;
            run_search(&engine, model, &query, k, scheme)
        }
        Commands::Eval { index, lexicon, gold, k } => {
            let engine = open_engine(&index, lexicon.as_deref())?;
            run_eval(&engine, &gold, k)
        }
    }
}

fn load_normalizer(lexicon: Option<&str>) -> Result<LexiconNormalizer> {
    match lexicon {
        Some(path) => LexiconNormalizer::from_path(path).with_context(|| format!("loading lexicon {path}")),
        None => Ok(LexiconNormalizer::default()),
    }
}

fn open_engine(index: &str, lexicon: Option<&str>) -> Result<Engine> {
    let normalizer = load_normalizer(lexicon)?;
    let corpus = load_snapshot(&IndexPaths::new(index)).with_context(|| format!("loading index {index}"))?;
    Ok(Engine::with_lexicon(corpus, normalizer))
}

fn build_index(input: &str, output: &str, places: Option<&str>, lexicon: Option<&str>) -> Result<()> {
    let normalizer = load_normalizer(lexicon)?;
    let out_paths = IndexPaths::new(output);

    let mut builder = IndexBuilder::new();
    for file in input_files(Path::new(input))? {
        let reviews = read_reviews(&file)?;
        tracing::info!(file = %file.display(), reviews = reviews.len(), "read reviews");
        for review in reviews {
            let tokens = normalizer.normalize(&review.text);
            builder.add(SourceDoc {
                place: review.place.trim().to_string(),
                location: review.location,
                rating: review.rating,
                tokens,
            });
        }
    }

    if let Some(path) = places {
        match read_place_info(Path::new(path)) {
            Ok(info) => {
                tracing::info!(places = info.len(), "merged place info");
                builder.place_info(info);
            }
            Err(e) => tracing::warn!(path, error = %e, "place info unavailable, continuing without it"),
        }
    }

    let index = builder.build().context("building index")?;
    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    save_snapshot(&out_paths, &index, &created_at)?;

    tracing::info!(output, "index build complete");
    Ok(())
}

/// JSON/JSONL files under `input`, in path order so doc ids are reproducible.
fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }
    Ok(files)
}

fn read_reviews(file: &Path) -> Result<Vec<InputReview>> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut reviews = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let review: InputReview = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}", file.display(), line_no + 1))?;
            reviews.push(review);
        }
        return Ok(reviews);
    }
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(anyhow::Error::from))
            .collect(),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(json)?]),
        _ => {
            tracing::warn!(file = %file.display(), "skipping file without review objects");
            Ok(Vec::new())
        }
    }
}

fn read_place_info(path: &Path) -> Result<Vec<PlaceInfo>> {
    let f = File::open(path)?;
    let mut info: Vec<PlaceInfo> = serde_json::from_reader(BufReader::new(f))?;
    for place in info.iter_mut() {
        place.name = place.name.trim().to_string();
    }
    Ok(info)
}

fn ranked_ids(engine: &Engine, query: &str, scheme: WeightingScheme) -> Vec<DocId> {
    let request = RetrievalRequest { query: query.to_string(), model: Model::Vsm, scheme: Some(scheme), top_k: None };
    match engine.retrieve(&request) {
        Retrieval::Ranked(docs) => docs.into_iter().map(|d| d.doc_id).collect(),
        Retrieval::Boolean(ids) => ids.into_iter().collect(),
    }
}

fn run_search(engine: &Engine, model: Model, query: &str, k: usize, scheme: WeightingScheme) -> Result<()> {
    let request = RetrievalRequest { query: query.to_string(), model, scheme: Some(scheme), top_k: Some(k) };
    println!("model: {model}  query: {query:?}");
    if model == Model::Vsm {
        println!("tokens: {:?}  scheme: {scheme}", engine.analyze(query).tokens);
    }
    match engine.retrieve(&request) {
        Retrieval::Boolean(ids) => {
            println!("{} matching documents", ids.len());
            println!("{}", serde_json::to_string_pretty(&ids)?);
        }
        Retrieval::Ranked(docs) if docs.is_empty() => println!("no results"),
        Retrieval::Ranked(docs) => {
            let index = engine.index();
            for d in docs {
                let place = index.doc(d.doc_id).map(|m| m.place.as_str()).unwrap_or("?");
                println!("- doc {:<8} score {:.4}  {place}", d.doc_id, d.score);
            }
        }
    }
    Ok(())
}

fn run_eval(engine: &Engine, gold: &str, k: usize) -> Result<()> {
    let f = File::open(gold).with_context(|| format!("opening gold set {gold}"))?;
    let gold: GoldSet = serde_json::from_reader(BufReader::new(f))?;
    tracing::info!(queries = gold.queries.len(), "loaded gold set");

    let mut ap_raw = Vec::with_capacity(gold.queries.len());
    let mut ap_sub = Vec::with_capacity(gold.queries.len());
    println!("{:<8} {:<16} {}", "QID", "MODEL", "METRICS");
    for q in &gold.queries {
        let request =
            RetrievalRequest { query: q.query_text.clone(), model: Model::Boolean, scheme: None, top_k: None };
        let matched: Vec<DocId> = match engine.retrieve(&request) {
            Retrieval::Boolean(ids) => ids.into_iter().collect(),
            Retrieval::Ranked(docs) => docs.into_iter().map(|d| d.doc_id).collect(),
        };
        let m = precision_recall_f1(matched, q.relevant_docs.iter().copied());
        println!(
            "{:<8} {:<16} P {:.2}  R {:.2}  F1 {:.2}  (ret {}, rel {}, tp {})",
            q.query_id, "boolean", m.precision, m.recall, m.f1, m.retrieved, m.relevant, m.true_positives
        );

        for (scheme, aps) in [(WeightingScheme::RawTfIdf, &mut ap_raw), (WeightingScheme::Sublinear, &mut ap_sub)] {
            let ranked = ranked_ids(engine, &q.query_text, scheme);
            let ap = average_precision(&ranked, &q.relevant_docs, k);
            aps.push(ap);
            let top: Vec<DocId> = ranked.iter().take(3).copied().collect();
            println!("{:<8} {:<16} AP@{k} {ap:.3}  (top 3: {top:?})", q.query_id, format!("vsm {scheme}"));
        }
    }

    let map_raw = mean_average_precision(&ap_raw);
    let map_sub = mean_average_precision(&ap_sub);
    println!();
    println!("MAP@{k} raw-tfidf: {map_raw:.4}");
    println!("MAP@{k} sublinear: {map_sub:.4}");
    let better = if map_sub > map_raw { "sublinear" } else { "raw-tfidf" };
    println!("better ranking: {better}");
    Ok(())
}
