use anyhow::{bail, Context, Result};
use candidates::{CandidateSource, FileListSource, HttpListSource, StaticListSource};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use probe::{PipelineOptions, ProbeEvent, ProbePipeline, ProbeResult, SimulatedStage, StageState};
use reality_core::{Locale, ServerParameters};
use session::{EventLog, Session, SessionListener};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

mod config;
mod logging;

use config::{Config, ScanConfig, ServerConfig, SimulateConfig, DEFAULT_CONFIG_FILE};

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json, Jsonl }

impl OutputFormat {
    fn from_config(s: &str) -> Option<Self> {
        match s {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "jsonl" => Some(OutputFormat::Jsonl),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogFormat { Text, Json }

#[derive(Debug, Parser)]
#[command(name = "reality-wizard", version, about = "VLESS + Reality config generator and edge address scanner")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./wizard.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Log record format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,
    /// Display locale reported with usage events (en or fa)
    #[arg(long, global = true, default_value = "en")]
    locale: Locale,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Default, Args)]
struct ServerArgs {
    /// Server address (IP or hostname)
    #[arg(long)]
    address: Option<String>,
    /// Server port
    #[arg(long)]
    port: Option<u16>,
    /// SNI / dest domain
    #[arg(long)]
    sni: Option<String>,
    /// Reuse an existing client UUID instead of generating one
    #[arg(long)]
    client_id: Option<String>,
    /// Reuse an existing private key; the public key is derived from it
    #[arg(long)]
    private_key: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
struct SourceArgs {
    /// Range list URL (repeatable). Default: the Cloudflare v4 and v6 lists.
    #[arg(long = "url", value_name = "URL", conflicts_with_all = ["list", "builtin"])]
    urls: Vec<String>,
    /// Local range list file, one CIDR per line
    #[arg(long, value_name = "FILE", conflicts_with = "builtin")]
    list: Option<PathBuf>,
    /// Use the built-in edge range list; no network fetch
    #[arg(long, default_value_t = false)]
    builtin: bool,
    /// Timeout for fetching the list, in milliseconds
    #[arg(long)]
    fetch_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Args)]
struct ProbeArgs {
    /// Per-stage timeout in milliseconds
    #[arg(long)]
    stage_timeout_ms: Option<u64>,
    /// Seed for the simulated stages; makes runs reproducible
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Generate a client UUID and X25519 key pair
    Keygen {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Build the client link and the server config.json
    Generate {
        #[command(flatten)]
        server: ServerArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write the server config.json to FILE (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Print the client link as a terminal QR code
        #[cfg(feature = "qr")]
        #[arg(long, default_value_t = false)]
        qr: bool,
        /// Write the client link QR code as SVG to FILE
        #[cfg(feature = "qr")]
        #[arg(long, value_name = "FILE")]
        qr_svg: Option<PathBuf>,
    },
    /// Fetch and print the candidate range list
    Candidates {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Probe candidate ranges and rank them
    Scan {
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        probe: ProbeArgs,
        /// Probe at most N entries of the list
        #[arg(long)]
        max_candidates: Option<usize>,
        /// Overall time limit for the run in milliseconds
        #[arg(long)]
        run_budget_ms: Option<u64>,
        /// Use the best passing result as server address and print its link
        #[arg(long, default_value_t = false)]
        select: bool,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// Output file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Write CSV instead of text/json when --out is provided
        #[arg(long, default_value_t = false)]
        csv: bool,
    },
    /// Run the three-stage connection test against the server address
    Test {
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        probe: ProbeArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded_cfg = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    let log_cfg = loaded_cfg.log.clone().unwrap_or_default();
    let level = match cli.verbose {
        0 => log_cfg.level.as_deref().unwrap_or("warn"),
        1 => "info",
        _ => "debug",
    };
    let json_logs = match cli.log_format {
        Some(f) => f == LogFormat::Json,
        None => log_cfg.format.as_deref() == Some("json"),
    };
    logging::init_tracing_once(level, json_logs);

    match cli.command {
        Commands::Version => {
            println!("reality-wizard {}", reality_core::version());
        }
        Commands::Keygen { format } => {
            let id = identity::generate_identity();
            let short_id = reality_core::ShortId::derive(&id.public_key);
            match format {
                OutputFormat::Text => {
                    println!("client id:   {}", id.client_id);
                    println!("private key: {}", id.private_key);
                    println!("public key:  {}", id.public_key);
                    println!("short id:    {}", short_id);
                }
                OutputFormat::Json | OutputFormat::Jsonl => {
                    let obj = serde_json::json!({
                        "client_id": id.client_id,
                        "private_key": id.private_key,
                        "public_key": id.public_key,
                        "short_id": short_id,
                    });
                    println!("{}", serde_json::to_string(&obj)?);
                }
            }
        }
        #[cfg(feature = "qr")]
        Commands::Generate { server, format, out, qr, qr_svg } => {
            let session = build_session(&server, &loaded_cfg, cli.locale)?;
            generate(&session, format, out.as_deref())?;
            let uri = &session.encodings().client_uri;
            if qr {
                println!("{}", encoder::render_qr_text(uri)?);
            }
            if let Some(path) = qr_svg {
                let svg = encoder::render_qr_svg(uri)?;
                std::fs::write(&path, svg).with_context(|| format!("writing {}", path.display()))?;
                eprintln!("wrote QR code to {}", path.display());
            }
        }
        #[cfg(not(feature = "qr"))]
        Commands::Generate { server, format, out } => {
            let session = build_session(&server, &loaded_cfg, cli.locale)?;
            generate(&session, format, out.as_deref())?;
        }
        Commands::Candidates { source, format } => {
            let scan_cfg = loaded_cfg.scan.clone().unwrap_or_default();
            let src = candidate_source(&source, &scan_cfg)?;
            let list = runtime()?.block_on(src.fetch_candidates())?;
            match format {
                OutputFormat::Text => {
                    for c in &list {
                        println!("{}\t{}", c, c.probe_host());
                    }
                }
                OutputFormat::Json => {
                    let obj = serde_json::json!({
                        "source": src.describe(),
                        "count": list.len(),
                        "candidates": list,
                    });
                    println!("{}", serde_json::to_string(&obj)?);
                }
                OutputFormat::Jsonl => {
                    for c in &list {
                        let obj = serde_json::json!({ "address": c, "host": c.probe_host() });
                        println!("{}", serde_json::to_string(&obj)?);
                    }
                }
            }
        }
        Commands::Scan { server, source, probe, mut max_candidates, mut run_budget_ms, select, mut format, out, csv } => {
            let scan_cfg = loaded_cfg.scan.clone().unwrap_or_default();
            if max_candidates.is_none() { max_candidates = scan_cfg.max_candidates; }
            if run_budget_ms.is_none() { run_budget_ms = scan_cfg.run_budget_ms; }
            if format.is_none() { format = scan_cfg.format.as_deref().and_then(OutputFormat::from_config); }
            let format = format.unwrap_or(OutputFormat::Text);

            let mut session = build_session(&server, &loaded_cfg, cli.locale)?;
            if format == OutputFormat::Text {
                session.subscribe(Box::new(Progress));
            }
            let src = candidate_source(&source, &scan_cfg)?;
            let mut options = pipeline_options(&probe, &scan_cfg);
            if let Some(n) = max_candidates {
                if n == 0 { bail!("--max-candidates must be > 0"); }
                options.max_candidates = n;
            }
            if let Some(ms) = run_budget_ms {
                options.run_budget = Some(Duration::from_millis(ms));
            }
            let pipeline = build_pipeline(&probe, &scan_cfg, options);

            let started_at = now_rfc3339();
            let results = runtime()?.block_on(session::run_scan(&mut session, src.as_ref(), &pipeline))?;
            let ended_at = now_rfc3339();
            let run_id = session.active_run().map(|r| r.to_string()).unwrap_or_default();

            if csv {
                if let Some(path) = &out {
                    write_csv(path, &run_id, &results)?;
                } else {
                    bail!("--csv requires --out <file>");
                }
            } else {
                let lines = scan_lines(format, &run_id, &started_at, &ended_at, &results)?;
                emit(&lines, out.as_deref())?;
            }

            if select {
                let best = results.iter().find(|r| r.is_passed()).map(|r| r.address.clone());
                match best {
                    Some(addr) => {
                        session.select_result(&addr)?;
                        eprintln!("selected {} ({})", session.parameters().address, addr);
                        println!("{}", session.encodings().client_uri);
                    }
                    None => eprintln!("no passing address to select"),
                }
            }
        }
        Commands::Test { server, probe, format } => {
            let scan_cfg = loaded_cfg.scan.clone().unwrap_or_default();
            let session = build_session(&server, &loaded_cfg, cli.locale)?;
            if let Err(e) = session.parameters().validate() {
                bail!("cannot test connection: {e}");
            }
            let pipeline = build_pipeline(&probe, &scan_cfg, pipeline_options(&probe, &scan_cfg));
            let mut print_err = None;
            let result = runtime()?.block_on(session::run_connection_test(&session, &pipeline, |e| {
                if let Err(err) = print_stage(format, e) {
                    print_err.get_or_insert(err);
                }
            }))?;
            if let Some(err) = print_err {
                return Err(err);
            }
            match format {
                OutputFormat::Text => {
                    let verdict = if result.is_passed() { "PASSED" } else { "FAILED" };
                    println!("{}: {}", result.host, verdict);
                }
                OutputFormat::Json | OutputFormat::Jsonl => {
                    let obj = serde_json::json!({
                        "address": result.host,
                        "passed": result.is_passed(),
                        "latency_ms": result.latency_ms,
                        "packet_loss_percent": result.packet_loss_percent,
                    });
                    println!("{}", serde_json::to_string(&obj)?);
                }
            }
        }
    }
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread().enable_all().build()?)
}

/// Start a session from config and flags. Flags override the config file.
fn build_session(args: &ServerArgs, cfg: &Config, locale: Locale) -> Result<Session> {
    let server = cfg.server.clone().unwrap_or_default();
    let ServerConfig { address, port, sni } = server;

    let mut id = identity::generate_identity();
    if let Some(pk) = &args.private_key {
        id.public_key = identity::derive_public_key(pk).context("invalid --private-key")?;
        id.private_key = pk.trim().to_string();
    }
    if let Some(cid) = &args.client_id {
        id.client_id = cid.trim().to_string();
    }
    let mut params = ServerParameters::default();
    id.apply_to(&mut params);

    let mut session = Session::new(params, locale);
    session.subscribe(Box::new(EventLog::new(locale)));
    if let Some(a) = args.address.clone().or(address) {
        session.set_address(&a);
    }
    if let Some(p) = args.port.or(port) {
        session.set_port(p);
    }
    if let Some(s) = args.sni.clone().or(sni) {
        session.set_server_name(&s);
    }
    Ok(session)
}

fn generate(session: &Session, format: OutputFormat, out: Option<&Path>) -> Result<()> {
    if let Err(e) = session.parameters().validate() {
        bail!("cannot generate config: {e} (pass it as a flag or set it under `server:` in {DEFAULT_CONFIG_FILE})");
    }
    let encodings = session.encodings();
    let Some(descriptor) = &encodings.descriptor else {
        bail!("cannot generate config: parameters are incomplete");
    };
    let pretty = descriptor.to_json_pretty()?;
    let short_id = session.parameters().short_id();
    match format {
        OutputFormat::Text => {
            println!("client link:\n{}\n", encodings.client_uri);
            println!("short id: {}\n", short_id);
            println!("server config.json:\n{}", pretty);
        }
        OutputFormat::Json | OutputFormat::Jsonl => {
            let obj = serde_json::json!({
                "client_uri": encodings.client_uri,
                "short_id": short_id,
                "server_config": descriptor,
            });
            println!("{}", serde_json::to_string(&obj)?);
        }
    }
    if let Some(path) = out {
        std::fs::write(path, format!("{pretty}\n")).with_context(|| format!("writing {}", path.display()))?;
        session::track("server_config_generated", session.locale(), &format!("sni={} port={}", session.parameters().server_name, session.parameters().port));
        eprintln!("wrote server config to {}", path.display());
    }
    Ok(())
}

fn candidate_source(args: &SourceArgs, cfg: &ScanConfig) -> Result<Box<dyn CandidateSource>> {
    if args.builtin {
        return Ok(Box::new(StaticListSource::builtin()));
    }
    if let Some(path) = args.list.clone().or_else(|| if args.urls.is_empty() { cfg.list_file.clone() } else { None }) {
        return Ok(Box::new(FileListSource::new(path)));
    }
    let urls = if !args.urls.is_empty() {
        args.urls.clone()
    } else {
        cfg.urls.clone().unwrap_or_else(HttpListSource::default_urls)
    };
    let timeout_ms = args.fetch_timeout_ms.or(cfg.fetch_timeout_ms).unwrap_or(10_000);
    Ok(Box::new(HttpListSource::new(urls, Duration::from_millis(timeout_ms))?))
}

fn pipeline_options(args: &ProbeArgs, cfg: &ScanConfig) -> PipelineOptions {
    let mut options = PipelineOptions::default();
    if let Some(ms) = args.stage_timeout_ms.or(cfg.stage_timeout_ms) {
        options.stage_timeout = Duration::from_millis(ms);
    }
    options
}

fn build_pipeline(args: &ProbeArgs, cfg: &ScanConfig, options: PipelineOptions) -> ProbePipeline {
    let simulate = cfg.simulate.clone().unwrap_or_default();
    let seed = args.seed.or(cfg.seed);
    let stages = SimulatedStage::set(|k| SimulateConfig::profile(&simulate, k), seed);
    ProbePipeline::new(stages, options)
}

/// Stage progress on stderr while a text-mode scan runs.
struct Progress;

impl SessionListener for Progress {
    fn on_probe_event(&self, event: &ProbeEvent) {
        match event {
            ProbeEvent::Started { addresses, .. } => eprintln!("probing {} candidate(s)", addresses.len()),
            ProbeEvent::StageChanged { address, stage, state, .. } if *state != StageState::Running => {
                eprintln!("  {address} {stage}: {state}")
            }
            ProbeEvent::SourceUnavailable { reason, .. } => eprintln!("candidate source unavailable: {reason}"),
            _ => {}
        }
    }
}

fn print_stage(format: OutputFormat, event: &ProbeEvent) -> Result<()> {
    let ProbeEvent::StageChanged { stage, state, message, detail, .. } = event else {
        return Ok(());
    };
    match format {
        OutputFormat::Text => {
            if *state == StageState::Running {
                println!("[{}] running...", stage.label());
            } else {
                println!("[{}] {}: {}", stage.label(), state, message.as_deref().unwrap_or(""));
                if let Some(d) = detail {
                    println!("    {d}");
                }
            }
        }
        OutputFormat::Json | OutputFormat::Jsonl => {
            let obj = serde_json::json!({
                "stage": stage,
                "state": state,
                "message": message,
                "detail": detail,
            });
            println!("{}", serde_json::to_string(&obj)?);
        }
    }
    Ok(())
}

fn result_json(run_id: &str, r: &ProbeResult) -> serde_json::Value {
    serde_json::json!({
        "run_id": run_id,
        "address": r.address,
        "host": r.host,
        "latency_ms": r.latency_ms,
        "packet_loss_percent": r.packet_loss_percent,
        "passed": r.is_passed(),
    })
}

fn scan_lines(format: OutputFormat, run_id: &str, started_at: &str, ended_at: &str, results: &[ProbeResult]) -> Result<Vec<String>> {
    let lines = match format {
        OutputFormat::Text => {
            if results.is_empty() {
                vec!["no candidates probed".to_string()]
            } else {
                results
                    .iter()
                    .enumerate()
                    .map(|(i, r)| {
                        let latency = r.latency_ms.map(|v| format!("{v} ms")).unwrap_or_else(|| "-".into());
                        let loss = r.packet_loss_percent.map(|v| format!("{v}%")).unwrap_or_else(|| "-".into());
                        let verdict = if r.is_passed() { "pass" } else { "fail" };
                        format!("{:>2}. {:<20} {:<16} {:>8} {:>4} {}", i + 1, r.address, r.host, latency, loss, verdict)
                    })
                    .collect()
            }
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "run_id": run_id,
                "started_at": started_at,
                "ended_at": ended_at,
                "results": results.iter().map(|r| result_json(run_id, r)).collect::<Vec<_>>(),
            });
            vec![serde_json::to_string(&obj)?]
        }
        OutputFormat::Jsonl => results
            .iter()
            .map(|r| serde_json::to_string(&result_json(run_id, r)))
            .collect::<Result<_, _>>()?,
    };
    Ok(lines)
}

fn emit(lines: &[String], out: Option<&Path>) -> Result<()> {
    if let Some(path) = out {
        let file = OpenOptions::new().create(true).truncate(true).write(true).open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let mut w = BufWriter::new(file);
        for line in lines {
            writeln!(w, "{}", line)?;
        }
        w.flush()?;
    } else {
        for line in lines {
            println!("{}", line);
        }
    }
    Ok(())
}

fn write_csv(path: &Path, run_id: &str, results: &[ProbeResult]) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(["rank", "address", "host", "latency_ms", "packet_loss_percent", "passed", "run_id"])?;
    for (i, r) in results.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            r.address.clone(),
            r.host.clone(),
            r.latency_ms.map(|v| v.to_string()).unwrap_or_default(),
            r.packet_loss_percent.map(|v| v.to_string()).unwrap_or_default(),
            r.is_passed().to_string(),
            run_id.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(address: &str, passed: bool, latency: Option<u64>) -> ProbeResult {
        ProbeResult {
            address: address.into(),
            host: address.into(),
            latency_ms: latency,
            packet_loss_percent: Some(0),
            passed: Some(passed),
        }
    }

    #[test]
    fn cli_parses_scan_flags() {
        let cli = Cli::try_parse_from([
            "reality-wizard", "--locale", "fa", "-vv", "scan", "--builtin", "--max-candidates", "3", "--seed", "5", "--format", "jsonl",
        ])
        .unwrap();
        assert_eq!(cli.locale, Locale::Fa);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Scan { source, probe, max_candidates, format, .. } => {
                assert!(source.builtin);
                assert_eq!(probe.seed, Some(5));
                assert_eq!(max_candidates, Some(3));
                assert_eq!(format, Some(OutputFormat::Jsonl));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["reality-wizard", "--locale", "de", "version"]).is_err());
        assert!(Cli::try_parse_from(["reality-wizard", "scan", "--builtin", "--list", "x.txt"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let cfg = Config {
            server: Some(ServerConfig { address: Some("198.51.100.1".into()), port: Some(2053), sni: Some("www.apple.com".into()) }),
            ..Config::default()
        };
        let args = ServerArgs { port: Some(8443), ..ServerArgs::default() };
        let s = build_session(&args, &cfg, Locale::En).unwrap();
        assert_eq!(s.parameters().address, "198.51.100.1");
        assert_eq!(s.parameters().port, 8443);
        assert_eq!(s.parameters().server_name, "www.apple.com");
        assert!(s.encodings().is_complete());
    }

    #[test]
    fn private_key_flag_derives_public_key() {
        let id = identity::generate_identity();
        let args = ServerArgs { private_key: Some(id.private_key.clone()), client_id: Some(id.client_id.clone()), ..ServerArgs::default() };
        let s = build_session(&args, &Config::default(), Locale::En).unwrap();
        assert_eq!(s.parameters().public_key, id.public_key);
        assert_eq!(s.parameters().client_id, id.client_id);
        assert!(build_session(&ServerArgs { private_key: Some("short".into()), ..ServerArgs::default() }, &Config::default(), Locale::En).is_err());
    }

    #[test]
    fn generate_refuses_incomplete_parameters() {
        let s = build_session(&ServerArgs::default(), &Config::default(), Locale::En).unwrap();
        let err = generate(&s, OutputFormat::Json, None).unwrap_err();
        assert!(err.to_string().contains("`address`"));
    }

    #[test]
    fn generate_writes_pretty_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let args = ServerArgs { address: Some("203.0.113.8".into()), ..ServerArgs::default() };
        let s = build_session(&args, &Config::default(), Locale::En).unwrap();
        generate(&s, OutputFormat::Json, Some(&path)).unwrap();
        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["inbounds"][0]["port"], 443);
        assert_eq!(written["inbounds"][0]["streamSettings"]["realitySettings"]["dest"], "cloudflare.com:443");
    }

    #[test]
    fn csv_has_one_row_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.csv");
        write_csv(&path, "run-1", &[result("104.16.0.0/13", true, Some(40)), result("1.1.1.1", false, None)]).unwrap();
        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "104.16.0.0/13");
        assert_eq!(&rows[0][3], "40");
        assert_eq!(&rows[1][3], "");
        assert_eq!(&rows[1][5], "false");
    }

    #[test]
    fn jsonl_is_one_object_per_result() {
        let lines = scan_lines(OutputFormat::Jsonl, "r", "a", "b", &[result("x", true, Some(1)), result("y", false, None)]).unwrap();
        assert_eq!(lines.len(), 2);
        let v: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(v["address"], "y");
        assert_eq!(v["passed"], false);
        assert!(v["latency_ms"].is_null());
    }

    #[test]
    fn builtin_source_wins() {
        let args = SourceArgs { builtin: true, ..SourceArgs::default() };
        let src = candidate_source(&args, &ScanConfig::default()).unwrap();
        assert_eq!(src.describe(), StaticListSource::builtin().describe());
    }
}
