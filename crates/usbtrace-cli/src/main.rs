use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use log::{LevelFilter, debug};
use usbtrace_core::{AnalyzerConfig, PacketRecord, Report};

#[derive(Parser, Debug)]
#[command(name = "usbtrace")]
#[command(version)]
#[command(
    about = "Offline USB protocol analyzer for bus-level and usbmon captures.",
    long_about = None,
    after_help = "Examples:\n  usbtrace pcap analyse capture.pcapng -o report.json\n  usbtrace pcap analyze capture.pcap --stdout --pretty\n  usbtrace usbmon analyse usbmon1.bin -o report.json"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Operations on PCAP/PCAPNG inputs (linktypes 288, 189 and 220).
    Pcap {
        #[command(subcommand)]
        command: AnalyseCommand,
    },
    /// Operations on raw usbmon event streams.
    Usbmon {
        #[command(subcommand)]
        command: AnalyseCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AnalyseCommand {
    /// Decode a capture and write a versioned JSON report.
    #[command(alias = "analyze")]
    Analyse(AnalyseArgs),
}

#[derive(Args, Debug)]
struct AnalyseArgs {
    /// Capture file (glob patterns matching exactly one file are accepted)
    input: PathBuf,

    /// Output report path (JSON)
    #[arg(short = 'o', long, required_unless_present = "stdout")]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Compact JSON output (default)
    #[arg(long)]
    compact: bool,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    /// Exit with a non-zero code if malformed packets were decoded
    #[arg(long)]
    strict: bool,

    /// List malformed packets after analysis
    #[arg(long)]
    list_malformed: bool,

    /// Analyzer configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit every acknowledged transaction as its own transfer
    #[arg(long)]
    no_collate: bool,

    /// Drop start-of-frame packets before decoding
    #[arg(long, conflicts_with = "keep_sofs")]
    filter_sofs: bool,

    /// Keep start-of-frame packets individually instead of grouping runs
    #[arg(long)]
    keep_sofs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Pcap,
    Usbmon,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Pcap {
            command: AnalyseCommand::Analyse(args),
        } => cmd_analyse(InputKind::Pcap, args),
        Commands::Usbmon {
            command: AnalyseCommand::Analyse(args),
        } => cmd_analyse(InputKind::Usbmon, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let _ = builder.try_init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn cmd_analyse(kind: InputKind, args: AnalyseArgs) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&args.input)?;
    validate_input_file(kind, &resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;

    let report_path = if args.stdout {
        None
    } else {
        let path = args.report.clone().ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?;
        ensure_distinct_output(&path, &input_abs)?;
        Some(path)
    };

    let config = load_config(&args)?;
    debug!("analyzer configuration: {config:?}");

    let rep = match kind {
        InputKind::Pcap => usbtrace_core::analyze_pcap_file_with(&resolved_input, &config)
            .context("PCAP/PCAPNG analysis failed")?,
        InputKind::Usbmon => usbtrace_core::analyze_usbmon_file(&resolved_input, &config)
            .context("usbmon stream analysis failed")?,
    };
    let json = serialize_report(&rep, args.pretty, args.compact)?;

    match report_path {
        None => print!("{}", json),
        Some(report) => {
            if let Some(parent) = report.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create output directory: {}", parent.display())
                    })?;
                }
            }
            fs::write(&report, json)
                .with_context(|| format!("Failed to write report: {}", report.display()))?;
            if !args.quiet {
                eprintln!(
                    "OK: {} packet(s), {} malformed -> {}",
                    rep.decode_summary.packets_total,
                    rep.decode_summary.malformed,
                    report.display()
                );
            }
        }
    }

    if args.list_malformed && !args.quiet {
        print_malformed(&rep);
    }
    if args.strict && rep.decode_summary.malformed > 0 {
        return Err(CliError::new(
            format!("malformed packets detected ({})", rep.decode_summary.malformed),
            Some("use --list-malformed to inspect".to_string()),
        ));
    }
    Ok(())
}

fn ensure_distinct_output(report_path: &Path, input_abs: &Path) -> Result<(), CliError> {
    let report_dir = report_path
        .parent()
        .map(|parent| {
            if parent.as_os_str().is_empty() {
                fs::canonicalize(".")
            } else {
                fs::canonicalize(parent)
            }
        })
        .transpose()
        .with_context(|| format!("Failed to resolve output path: {}", report_path.display()))?;
    let Some(report_dir) = report_dir else {
        return Ok(());
    };
    let file_name = report_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid report path: {}", report_path.display()))?;
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!("report path must differ from input: {}", report_path.display()),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn load_config(args: &AnalyseArgs) -> Result<AnalyzerConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::from_json_file(path).map_err(|err| {
            CliError::new(
                err.to_string(),
                Some("accepted keys: collate_transfers, conglomerate_sofs, filter_sofs, poll_timeout_ms, channel_capacity".to_string()),
            )
        })?,
        None => AnalyzerConfig::default(),
    };
    if args.no_collate {
        config.collate_transfers = false;
    }
    if args.filter_sofs {
        config.filter_sofs = true;
    }
    if args.keep_sofs {
        config.conglomerate_sofs = false;
        config.filter_sofs = false;
    }
    config
        .validate()
        .map_err(|err| CliError::new(err.to_string(), None))?;
    Ok(config)
}

fn serialize_report(rep: &Report, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn print_malformed(rep: &Report) {
    eprintln!("Malformed packets:");
    for record in &rep.packets {
        print_malformed_in(record);
    }
}

fn print_malformed_in(record: &PacketRecord) {
    if record.kind == "MalformedPacket" {
        eprintln!(
            "  {:>12}us {}",
            record.summary.timestamp_us, record.summary.summary
        );
    }
    for subordinate in &record.subordinates {
        print_malformed_in(subordinate);
    }
}

fn validate_input_file(kind: InputKind, input: &Path) -> Result<(), CliError> {
    let expected = match kind {
        InputKind::Pcap => "use a .pcap or .pcapng file",
        InputKind::Usbmon => "use a file captured from /dev/usbmonN",
    };
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some(expected.to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some(expected.to_string()),
        ));
    }
    if kind == InputKind::Usbmon {
        return Ok(());
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        count => {
            let mut message = format!("multiple files match pattern '{}' ({} matches)", pattern, count);
            let listed: Vec<_> = matches.iter().take(3).map(|p| p.display().to_string()).collect();
            message.push_str("; matches: ");
            message.push_str(&listed.join(", "));
            if count > 3 {
                message.push_str(", ...");
            }
            Err(CliError::new(
                message,
                Some("pass a single capture file, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
