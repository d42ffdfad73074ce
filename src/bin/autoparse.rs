use anyhow::{bail, Context, Result};
use clap::Parser;
use regex::Regex;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use autoparse::batch::{self, BatchParser};
use autoparse::driver::{DriverConfig, StreamingDriver};
use autoparse::preprocess;
use autoparse::rules::RuleSet;
use autoparse::tokenizer::{self, LineFormat};

/// Separator used by the batch strategy, inherited from the offline
/// parser: whitespace plus the `=`, `:`, `,` punctuation that glues
/// key-value syntax together.
const BATCH_SEPARATOR: &str = r"[\s=:,]";

#[derive(Parser, Debug)]
#[command(name = "autoparse", version, about = "Template mining and entity extraction for log streams")]
struct Cli {
    /// Log directory (batch mode)
    #[arg(long = "in-dir")]
    log_dir: Option<PathBuf>,

    /// Log file inside the input directory (batch mode)
    #[arg(long)]
    filename: Option<String>,

    /// Output directory; falls back to $OUTPUT_DIR, then the working directory
    #[arg(long = "out-dir")]
    output_dir: Option<PathBuf>,

    /// Log format spec, e.g. "<process>: <content>"
    #[arg(long = "log-format", default_value = "<content>")]
    log_format: String,

    /// Similarity threshold for the batch strategy
    #[arg(long, default_value_t = batch::DEFAULT_TAU)]
    tau: f64,

    /// Token separator pattern (defaults per mode)
    #[arg(long)]
    separator: Option<String>,

    /// JSON rule table overriding the built-in entity rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Disable the indicator-of-compromise pre-extraction pass
    #[arg(long = "no-ioc", default_value_t = false)]
    no_ioc: bool,

    /// Streaming mode: read stdin, emit one JSON record per line
    #[arg(long, default_value_t = false)]
    stream: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let rules = match &cli.rules {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::defaults(),
    };

    if cli.stream {
        run_stream(&cli, rules)
    } else {
        run_batch(&cli, rules)
    }
}

fn output_dir(cli: &Cli) -> PathBuf {
    cli.output_dir
        .clone()
        .or_else(|| std::env::var_os("OUTPUT_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run_stream(cli: &Cli, rules: RuleSet) -> Result<()> {
    let config = DriverConfig {
        log_format: cli.log_format.clone(),
        extract_iocs: !cli.no_ioc,
    };
    let mut driver = StreamingDriver::new(config, rules)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("installing interrupt handler")?;
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        let line = line.context("reading stdin")?;
        // per-line failures are logged by the driver and never end the run
        if let Ok(record) = driver.process_line(&line) {
            serde_json::to_writer(&mut out, &record)?;
            out.write_all(b"\n")?;
        }
    }

    let keys = driver.finish();
    let path = output_dir(cli).join("log_keys.txt");
    let mut file =
        File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(keys.join("\n").as_bytes())?;
    tracing::info!(
        processed = driver.processed(),
        dropped = driver.dropped(),
        templates = keys.len(),
        "stream finished"
    );
    Ok(())
}

fn run_batch(cli: &Cli, rules: RuleSet) -> Result<()> {
    let Some(log_dir) = &cli.log_dir else {
        bail!("batch mode needs --in-dir");
    };
    let Some(filename) = &cli.filename else {
        bail!("batch mode needs --filename");
    };
    let format = LineFormat::compile(&cli.log_format)?;
    let separator = Regex::new(cli.separator.as_deref().unwrap_or(BATCH_SEPARATOR))
        .context("compiling separator pattern")?;

    let input = log_dir.join(filename);
    let reader = BufReader::new(
        File::open(&input).with_context(|| format!("opening {}", input.display()))?,
    );

    let mut parser = BatchParser::new(cli.tau);
    let mut line_id = 0usize;
    let mut dropped = 0usize;
    // per line: the pre-mask message and the combined parameter list
    let mut per_line: Vec<(String, Vec<autoparse::params::Parameter>)> = Vec::new();

    for line in reader.lines() {
        let line = line.context("reading input file")?;
        let line = tokenizer::sanitize(line.trim());
        let Some(fields) = format.parse(&line) else {
            dropped += 1;
            tracing::warn!(line = %line, "line does not match the log format");
            continue;
        };
        let Some(content) = fields
            .iter()
            .find(|(name, _)| *name == "content")
            .map(|(_, v)| v.to_string())
        else {
            dropped += 1;
            continue;
        };

        let (masked, mut params) = preprocess::preprocess_wildcard(&content, &rules);
        params.sort_by_key(|p| p.char_start);

        let original_seq = tokenizer::split(&content, &separator);
        let tokens = tokenizer::split(&masked, &separator);

        line_id += 1;
        let cluster_idx = parser.insert(tokens.clone(), line_id);
        let template = parser.cluster(cluster_idx).template().to_vec();
        params.extend(batch::extract_parameters(&template, &tokens, &original_seq));
        per_line.push((original_seq.join(" "), params));
    }

    let out_dir = output_dir(cli);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let assignments = parser.assignments();
    let structured_path = out_dir.join(format!("{filename}_structured.csv"));
    let mut structured = csv::Writer::from_path(&structured_path)
        .with_context(|| format!("creating {}", structured_path.display()))?;
    structured.write_record(["log_id", "message", "event_id", "template", "parameters"])?;
    for assignment in &assignments {
        let (message, params) = &per_line[assignment.line_id - 1];
        structured.write_record([
            assignment.line_id.to_string(),
            message.clone(),
            assignment.event_id.clone(),
            assignment.template.clone(),
            serde_json::to_string(params)?,
        ])?;
    }
    structured.flush()?;

    let templates_path = out_dir.join(format!("{filename}_templates.csv"));
    let mut templates = csv::Writer::from_path(&templates_path)
        .with_context(|| format!("creating {}", templates_path.display()))?;
    templates.write_record(["event_id", "template", "count"])?;
    for row in parser.cluster_rows() {
        templates.write_record([row.event_id, row.template, row.count.to_string()])?;
    }
    templates.flush()?;

    tracing::info!(
        lines = line_id,
        dropped,
        clusters = parser.clusters().len(),
        "batch run finished"
    );
    Ok(())
}
