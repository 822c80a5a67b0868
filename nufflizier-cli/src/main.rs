mod reports;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use nufflizier_core::{
    AnalysisConfig, ReplayModel, TimelineTurn, analyze_replay_input, build_timeline,
    observed_contracts, parse_replay_input, scope_replay_to_team,
};
use reports::{write_json_report, write_markdown_report, write_text_report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored console summary
    Text,
    /// The full report as pretty JSON
    Json,
    /// Markdown summary with key moments table
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "nufflizier", version)]
#[command(about = "Luck analysis for recorded tabletop sports match replays")]
struct Args {
    /// Verbose logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score a replay upload and print the luck report
    Analyze {
        /// Replay file: raw XML or a base64-wrapped upload
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Optional path to write the report instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override the decoded-size budget
        #[arg(long)]
        max_decoded_chars: Option<usize>,

        /// JSON file with analysis settings; omitted fields keep their defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the parsed replay model and its turn timeline as JSON
    Replay {
        file: PathBuf,

        /// Keep only what one team did
        #[arg(long)]
        team: Option<String>,

        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the roll-type contract registry
    Contracts {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayDump {
    replay: ReplayModel,
    timeline: Vec<TimelineTurn>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[nufflizier] {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Analyze {
            file,
            format,
            output,
            max_decoded_chars,
            config,
        } => {
            let config = load_config(config.as_deref(), max_decoded_chars)?;
            run_analyze(&file, format, output, &config)
        }
        Command::Replay {
            file,
            team,
            output,
            config,
        } => {
            let config = load_config(config.as_deref(), None)?;
            run_replay(&file, team.as_deref(), output, &config)
        }
        Command::Contracts { output } => {
            let mut output_target = OutputTarget::new(output)?;
            serde_json::to_writer_pretty(&mut output_target, observed_contracts())?;
            writeln!(&mut output_target)?;
            output_target.flush_inner()?;
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, max_decoded_chars: Option<usize>) -> Result<AnalysisConfig> {
    let mut config = if let Some(path) = path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        AnalysisConfig::from_json(&text)
            .with_context(|| format!("invalid config {}", path.display()))?
    } else {
        AnalysisConfig::default()
    };
    if let Some(limit) = max_decoded_chars {
        config = config.with_max_decoded_chars(limit);
    }
    config.validate()?;
    Ok(config)
}

fn read_upload(path: &Path, config: &AnalysisConfig) -> Result<String> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .len();
    if !usize::try_from(size).is_ok_and(|size| size <= config.max_input_bytes) {
        bail!(
            "{} is {size} bytes, above the {} byte upload limit",
            path.display(),
            config.max_input_bytes
        );
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn run_analyze(
    file: &Path,
    format: ReportFormat,
    output: Option<PathBuf>,
    config: &AnalysisConfig,
) -> Result<()> {
    let input = read_upload(file, config)?;
    let start_time = Instant::now();
    let report = analyze_replay_input(&input, config)?;
    let elapsed = start_time.elapsed();
    if elapsed.as_millis() > u128::from(config.max_analyze_duration_ms) {
        warn!(
            "analysis of {} took {elapsed:?}, over the {} ms budget",
            file.display(),
            config.max_analyze_duration_ms
        );
    }
    info!("analyzed {} in {elapsed:?}", file.display());

    let writes_file = output.is_some();
    let mut output_target = OutputTarget::new(output)?;
    match format {
        ReportFormat::Text => {
            if writes_file {
                colored::control::set_override(false);
            } else {
                announce_banner();
            }
            write_text_report(&mut output_target, &report)?;
        }
        ReportFormat::Json => write_json_report(&mut output_target, &report)?,
        ReportFormat::Markdown => write_markdown_report(&mut output_target, &report)?,
    }
    output_target.flush_inner()?;
    Ok(())
}

fn run_replay(
    file: &Path,
    team: Option<&str>,
    output: Option<PathBuf>,
    config: &AnalysisConfig,
) -> Result<()> {
    let input = read_upload(file, config)?;
    let mut replay = parse_replay_input(&input, config)?;
    if let Some(team_id) = team {
        if replay.team(team_id).is_none() {
            bail!("team {team_id} is not in match {}", replay.match_id);
        }
        replay = scope_replay_to_team(&replay, team_id);
    }
    let dump = ReplayDump {
        timeline: build_timeline(&replay),
        replay,
    };
    let mut output_target = OutputTarget::new(output)?;
    serde_json::to_writer_pretty(&mut output_target, &dump)?;
    writeln!(&mut output_target)?;
    output_target.flush_inner()?;
    Ok(())
}

fn announce_banner() {
    println!("{}", "🏈 Nufflizier".bright_cyan().bold());
    println!("{}", "=============".cyan());
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
