mod output;
mod telemetry;

use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use spanview_core::config::Config;
use spanview_core::ids::TraceId;
use spanview_core::model::waterfall::Waterfall;
use spanview_core::time::parse_duration_str;
use spanview_waterfall::build_waterfall;
use spanview_waterfall::otlp::decode::{PayloadFormat, decode_document};
use spanview_waterfall::otlp::http::HttpState;
use spanview_waterfall::tempo::{TempoClient, TempoConfig};
use tokio::io::AsyncReadExt;

use crate::output::print_waterfall_human;
use crate::telemetry::{init_cli_tracing, init_serve_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "spanview")]
#[command(about = "Render OpenTelemetry traces as span waterfalls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Render a trace document from a file or stdin")]
    Render {
        #[arg(help = "OTLP trace file; stdin when omitted or '-'")]
        file: Option<PathBuf>,
        #[arg(long, help = "json or proto; defaults to the file extension")]
        format: Option<String>,
    },
    #[command(about = "Fetch a trace from Tempo and render it")]
    Fetch {
        trace_id: String,
        #[arg(long)]
        tempo_url: Option<String>,
        #[arg(long, help = "Request timeout (e.g. 5s)")]
        timeout: Option<String>,
    },
    #[command(about = "Serve waterfalls over HTTP")]
    Serve {
        #[arg(long)]
        listen: Option<String>,
        #[arg(long)]
        tempo_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render { file, format } => {
            init_cli_tracing();
            let format = format.as_deref().map(PayloadFormat::parse).transpose()?;
            let (bytes, format) = read_input(file.as_deref(), format).await?;
            let doc = decode_document(&bytes, format)?;
            print_waterfall(&build_waterfall(&doc), cli.json)
        }
        Commands::Fetch {
            trace_id,
            tempo_url,
            timeout,
        } => {
            init_cli_tracing();
            let trace_id = TraceId::parse(&trace_id)?;
            let mut cfg = Config::load().context("load config")?;
            apply_cli_overrides(&mut cfg, tempo_url, None, timeout)?;

            let tempo = TempoClient::new(&TempoConfig::from(&cfg))?;
            let doc = tempo
                .fetch_trace(&trace_id)
                .await
                .with_context(|| format!("fetch trace {trace_id} from {}", cfg.tempo_url))?;
            print_waterfall(&build_waterfall(&doc), cli.json)
        }
        Commands::Serve { listen, tempo_url } => {
            init_serve_tracing();
            let mut cfg = Config::load().context("load config")?;
            apply_cli_overrides(&mut cfg, tempo_url, listen, None)?;
            let result = run_server(cfg).await;
            shutdown_tracing();
            result
        }
    }
}

async fn run_server(cfg: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", cfg.listen_addr))?;
    let tempo = TempoClient::new(&TempoConfig::from(&cfg))?;

    eprintln!("spanview serve");
    eprintln!("  listen: http://{addr}");
    eprintln!("  tempo: {}", cfg.tempo_url);

    spanview_waterfall::server::serve(addr, HttpState { tempo }, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c, shutting down");
    })
    .await?;
    Ok(())
}

async fn read_input(
    file: Option<&Path>,
    format: Option<PayloadFormat>,
) -> anyhow::Result<(Vec<u8>, PayloadFormat)> {
    match file.filter(|p| *p != Path::new("-")) {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("read {}", path.display()))?;
            Ok((bytes, format.unwrap_or_else(|| PayloadFormat::from_path(path))))
        }
        None => {
            let mut bytes = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut bytes)
                .await
                .context("read stdin")?;
            Ok((bytes, format.unwrap_or(PayloadFormat::Json)))
        }
    }
}

fn apply_cli_overrides(
    cfg: &mut Config,
    tempo_url: Option<String>,
    listen: Option<String>,
    timeout: Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = tempo_url {
        cfg.tempo_url = v;
    }
    if let Some(v) = listen {
        cfg.listen_addr = v;
    }
    if let Some(v) = timeout {
        cfg.tempo_timeout = parse_duration_str(&v)?;
    }
    Ok(())
}

fn print_waterfall(wf: &Waterfall, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(wf)?);
        return Ok(());
    }
    print_waterfall_human(wf, std::io::stdout().is_terminal());
    Ok(())
}
