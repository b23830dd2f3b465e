use clap::{Parser as ClapParser, Subcommand};
use scholia::classifier::ClassifierClient;
use scholia::classifier::http::{ClassifierEndpoint, HttpChatTransport};
use scholia::graph::GraphConstructor;
use scholia::handoff;
use scholia::normalize;
use scholia::{Config, Ontology, Parser, ParserOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(ClapParser)]
#[command(name = "scholia")]
#[command(about = "Parse scholarly monographs into typed knowledge graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an OCR text file and print the document model as JSON
    Parse {
        /// Path to the OCR'd markdown text
        input: PathBuf,

        /// Rejoin words hyphenated across line wraps before parsing
        #[arg(long, default_value = "false")]
        dehyphenate: bool,

        /// Strip OCR image artefacts before parsing
        #[arg(long, default_value = "false")]
        strip_images: bool,

        /// Minimum body length for the chapter fallback heuristic
        #[arg(long, default_value = "1000")]
        fallback_min_body_len: usize,

        /// Also decompose front- and back-matter paragraphs into atoms
        #[arg(long, default_value = "false")]
        decompose_front_matter: bool,
    },

    /// Parse a document and build its validated graph
    Graph {
        /// Path to the OCR'd markdown text
        input: PathBuf,

        /// Taxonomy JSON ({ "valid_classes": [...] })
        #[arg(long, default_value = "data/taxonomy.json")]
        taxonomy: PathBuf,

        /// Ontology JSON ({ "relationships": {...} })
        #[arg(long, default_value = "data/ontology.json")]
        ontology: PathBuf,

        /// Classifier API root
        #[arg(long, default_value = "https://api.mistral.ai")]
        base_url: String,

        /// Model name to request
        #[arg(long, default_value = "mistral-large-latest")]
        model: String,

        /// Environment variable holding the API key
        #[arg(long, default_value = "SCHOLIA_API_KEY")]
        api_key_env: String,

        /// Classifier calls per second (also the burst size)
        #[arg(long, default_value = "6.0")]
        rate: f64,

        /// Retries per atom before the error fallback
        #[arg(long, default_value = "3")]
        retries: u32,

        /// Bounded workers for chapters and for subsections
        #[arg(long, default_value = "4")]
        workers: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> scholia::Result<()> {
    match Cli::parse().command {
        Commands::Parse {
            input,
            dehyphenate,
            strip_images,
            fallback_min_body_len,
            decompose_front_matter,
        } => {
            let text = read_input(&input, dehyphenate, strip_images)?;
            let options = ParserOptions {
                fallback_min_body_len,
                decompose_front_matter,
            };
            let document = Parser::with_options(&text, options).parse()?;
            let record = handoff::document_record(&document);
            println!(
                "{}",
                serde_json::to_string_pretty(&record.parsed_content).expect("valid json")
            );
            Ok(())
        }
        Commands::Graph {
            input,
            taxonomy,
            ontology,
            base_url,
            model,
            api_key_env,
            rate,
            retries,
            workers,
        } => {
            let text = read_input(&input, false, false)?;
            let document = Parser::new(&text).parse()?;

            let ontology = Arc::new(Ontology::from_files(&taxonomy, &ontology)?);
            let api_key = std::env::var(&api_key_env).unwrap_or_default();
            if api_key.is_empty() {
                eprintln!("warning: {api_key_env} is empty; classifier calls will be rejected");
            }

            let mut config = Config::default();
            config.rate.tokens_per_second = rate;
            config.rate.burst = rate;
            config.classifier.retries = retries;
            config.classifier.backoff_factor = Duration::from_millis(100);
            config.concurrency.chapter_workers = workers;
            config.concurrency.subsection_workers = workers;

            let transport = HttpChatTransport::new(ClassifierEndpoint {
                base_url,
                api_key,
                model,
            })?;
            let classifier = ClassifierClient::new(Box::new(transport), ontology.clone(), &config);

            let constructor =
                GraphConstructor::new(&document, &classifier, &ontology, config.concurrency);
            let (graph, report) = constructor.build()?;

            let out = serde_json::json!({ "graph": graph, "report": report });
            println!("{}", serde_json::to_string_pretty(&out).expect("valid json"));
            Ok(())
        }
    }
}

fn read_input(path: &PathBuf, dehyphenate: bool, strip_images: bool) -> scholia::Result<String> {
    let mut text = std::fs::read_to_string(path)?;
    if strip_images {
        text = normalize::strip_image_markers(&text);
    }
    if dehyphenate {
        text = normalize::dehyphenate(&text);
    }
    Ok(text)
}
