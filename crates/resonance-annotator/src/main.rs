use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use resonance_core::{
    analyze_triad, generate_triad, AnnotatorConfig, CorpusWriter, SampleDraft, Triad,
};
use resonance_gemini::GeminiClient;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod interactive;
mod server;

fn cli() -> Command {
    Command::new("resonance-annotator")
        .version(resonance_core::VERSION)
        .about("Human-in-the-loop labeling of triadic resonance samples")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("corpus")
                .long("corpus")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Training corpus (JSON Lines) to append to"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .global(true)
                .help("Gemini model identifier"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate a candidate triad for a topic")
                .arg(
                    Arg::new("topic")
                        .long("topic")
                        .required(true)
                        .help("Theme the fragments should explore"),
                ),
        )
        .subcommand(
            Command::new("analyze")
                .about("Propose a resonance label for a triad")
                .arg(Arg::new("a").long("a").required(true).help("Fragment A"))
                .arg(Arg::new("b").long("b").required(true).help("Fragment B"))
                .arg(Arg::new("c").long("c").required(true).help("Fragment C")),
        )
        .subcommand(
            Command::new("save")
                .about("Append a reviewed sample (JSON) to the corpus")
                .arg(
                    Arg::new("file")
                        .value_parser(value_parser!(PathBuf))
                        .help("Sample file; reads stdin when omitted"),
                ),
        )
        .subcommand(Command::new("annotate").about("Annotate one sample interactively"))
        .subcommand(
            Command::new("serve")
                .about("Serve the JSON HTTP API")
                .arg(
                    Arg::new("addr")
                        .long("addr")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<AnnotatorConfig> {
    let mut config = AnnotatorConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("loading configuration")?;

    if let Some(path) = matches.get_one::<PathBuf>("corpus") {
        config = config.with_corpus_path(path);
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config = config.with_model(model);
    }
    Ok(config)
}

fn gemini(config: &AnnotatorConfig) -> Result<GeminiClient> {
    GeminiClient::from_settings(&config.model).context("configuring the Gemini client")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let mut config = load_config(&matches)?;
    tracing::debug!(?config, "configuration loaded");

    match matches.subcommand() {
        Some(("generate", args)) => {
            let topic = args.get_one::<String>("topic").map_or("", String::as_str);
            let triad = generate_triad(&gemini(&config)?, topic).await?;
            print_json(&triad)
        }
        Some(("analyze", args)) => {
            let fragment = |name: &str| args.get_one::<String>(name).cloned().unwrap_or_default();
            let triad = Triad::new(fragment("a"), fragment("b"), fragment("c"));
            let label = analyze_triad(&gemini(&config)?, &triad).await?;
            print_json(&label)
        }
        Some(("save", args)) => {
            let text = match args.get_one::<PathBuf>("file") {
                Some(path) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut text = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut text)
                        .await
                        .context("reading sample from stdin")?;
                    text
                }
            };
            let draft = SampleDraft::from_slice(text.as_bytes())?;
            CorpusWriter::new(&config.corpus_path).save_sample(draft).await?;
            print_json(&serde_json::json!({ "status": "saved" }))
        }
        Some(("annotate", _)) => {
            let model = gemini(&config)?;
            let writer = CorpusWriter::new(&config.corpus_path);
            let outcome = interactive::run(
                &model,
                &writer,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await?;
            tracing::info!(?outcome, "annotation finished");
            Ok(())
        }
        Some(("serve", args)) => {
            if let Some(addr) = args.get_one::<SocketAddr>("addr") {
                config = config.with_server_addr(*addr);
            }
            let model = Arc::new(gemini(&config)?);
            let writer = Arc::new(CorpusWriter::new(&config.corpus_path));

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "cannot listen for shutdown signal");
                }
            };
            let (addr, server) = server::bind(model, writer, config.server.addr, shutdown)
                .with_context(|| format!("binding {}", config.server.addr))?;

            tracing::info!(%addr, corpus = %config.corpus_path.display(), "serving annotation API");
            server.await;
            tracing::info!("server stopped");
            Ok(())
        }
        Some((other, _)) => bail!("unknown command `{other}`"),
        None => Ok(()),
    }
}
