//! CLI entry point for `mailshrink`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};

use mailshrink::config::{self, Config};
use mailshrink::imaging::Quality;
use mailshrink::model::node::{DocumentNode, Leaf};
use mailshrink::rewrite::{is_eligible, EligibilityPolicy, RewriteReport, Rewriter};

#[derive(Parser)]
#[command(
    name = "mailshrink",
    version,
    about = "Shrink the images inside e-mail messages",
    long_about = "Reads an RFC 5322 message, fits image attachments and CID-referenced \
                  inline images within a bounded box (upright, re-encoded as JPEG), and \
                  writes the message back with every other part untouched."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite the images of a message
    Shrink {
        /// Message file (.eml)
        input: PathBuf,
        /// Output file [default: <INPUT stem>_resized.eml]
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum output width in pixels
        #[arg(long, value_name = "PX")]
        max_width: Option<u32>,
        /// Maximum output height in pixels
        #[arg(long, value_name = "PX")]
        max_height: Option<u32>,
        /// JPEG quality (1-100)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
        quality: Option<u32>,
        /// Process sibling parts in parallel
        #[arg(long)]
        parallel: bool,
        /// Drop EXIF metadata from rewritten images
        #[arg(long)]
        strip_exif: bool,
        /// Also rewrite inline images that have no Content-ID
        #[arg(long)]
        allow_inline_without_cid: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the MIME tree of a message and which images would be rewritten
    Inspect {
        input: PathBuf,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration file
    InitConfig,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Command-line overrides applied on top of the loaded configuration.
struct ShrinkOptions {
    max_width: Option<u32>,
    max_height: Option<u32>,
    quality: Option<u32>,
    parallel: bool,
    strip_exif: bool,
    allow_inline_without_cid: bool,
}

impl ShrinkOptions {
    fn apply(&self, config: &mut Config) {
        let t = &mut config.transform;
        if let Some(w) = self.max_width {
            t.max_width = w;
        }
        if let Some(h) = self.max_height {
            t.max_height = h;
        }
        if let Some(q) = self.quality {
            t.quality = Quality::new(q);
        }
        t.parallel |= self.parallel;
        if self.strip_exif {
            t.preserve_exif = false;
        }
        if self.allow_inline_without_cid {
            t.inline_requires_content_id = false;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        Commands::Shrink {
            input,
            output,
            max_width,
            max_height,
            quality,
            parallel,
            strip_exif,
            allow_inline_without_cid,
            json,
        } => {
            ShrinkOptions {
                max_width,
                max_height,
                quality,
                parallel,
                strip_exif,
                allow_inline_without_cid,
            }
            .apply(&mut config);
            let output = output.unwrap_or_else(|| default_output_path(&input));
            cmd_shrink(&input, &output, &config, json)
        }
        Commands::Inspect { input, json } => cmd_inspect(&input, &config, json),
        Commands::InitConfig => cmd_init_config(),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_file = config::log_file_path(config);
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_file
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("mailshrink.log"));
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// `photos.eml` → `photos_resized.eml`, in the same directory.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "message".to_string());
    input.with_file_name(format!("{stem}_resized.eml"))
}

/// Read, rewrite and write one message.
fn cmd_shrink(input: &Path, output: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    let start = Instant::now();

    let input_size = std::fs::metadata(input).map(|m| m.len()).unwrap_or(0);
    let root = mailshrink::parser::read_document(input)?;
    let rewriter = Rewriter::new(&config.transform)?;
    let rewritten = rewriter.rewrite(root)?;

    mailshrink::export::write_document(&rewritten.root, output)?;
    let output_size = std::fs::metadata(output)?.len();
    let elapsed = start.elapsed();

    if json {
        print_report_json(input, output, input_size, output_size, &rewritten.report, elapsed)?;
    } else {
        print_report_table(input, output, input_size, output_size, &rewritten.report, elapsed);
    }

    if let Some(note) = rewritten.report.failure_note() {
        eprintln!("  {note}");
        for failure in &rewritten.report.failures {
            eprintln!("    {}: {}", failure.filename, failure.error);
        }
    }
    Ok(())
}

/// Print the document tree without rewriting anything.
fn cmd_inspect(input: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    let root = mailshrink::parser::read_document(input)?;
    let policy = EligibilityPolicy::from(&config.transform);

    if json {
        let tree = node_json(&root, &policy);
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        println!();
        print_node(&root, &policy, 1);
        println!();
    }
    Ok(())
}

/// Write the default configuration to the standard location.
fn cmd_init_config() -> anyhow::Result<()> {
    let path = config::config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    if path.exists() {
        anyhow::bail!("Config file already exists: {}", path.display());
    }
    config::save_config(&Config::default())?;
    println!("  Wrote {}", path.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailshrink", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn print_node(node: &DocumentNode, policy: &EligibilityPolicy, depth: usize) {
    use humansize::{format_size, BINARY};

    let indent = "  ".repeat(depth);
    match node {
        DocumentNode::Container(c) => {
            println!("{indent}{}", c.content_type());
            for child in &c.children {
                print_node(child, policy, depth + 1);
            }
        }
        DocumentNode::Leaf(leaf) => {
            let disposition = leaf
                .disposition
                .as_ref()
                .map(|d| d.as_str().to_string())
                .unwrap_or_else(|| "-".to_string());
            let mark = if is_eligible(leaf, policy) { "  [shrink]" } else { "" };
            println!(
                "{indent}{:<28} {:<10} {:<30} {:>10}{mark}",
                leaf.content_type.to_string(),
                disposition,
                leaf_label(leaf),
                format_size(leaf.payload.len() as u64, BINARY),
            );
        }
    }
}

fn leaf_label(leaf: &Leaf) -> String {
    match (&leaf.filename, &leaf.content_id) {
        (Some(name), _) => name.clone(),
        (None, Some(cid)) => format!("<{cid}>"),
        (None, None) => "-".to_string(),
    }
}

fn node_json(node: &DocumentNode, policy: &EligibilityPolicy) -> serde_json::Value {
    match node {
        DocumentNode::Container(c) => serde_json::json!({
            "content_type": c.content_type().to_string(),
            "boundary": c.boundary(),
            "children": c.children.iter().map(|n| node_json(n, policy)).collect::<Vec<_>>(),
        }),
        DocumentNode::Leaf(leaf) => serde_json::json!({
            "content_type": leaf.content_type.to_string(),
            "disposition": leaf.disposition.as_ref().map(|d| d.as_str().to_string()),
            "filename": leaf.filename,
            "content_id": leaf.content_id,
            "size": leaf.payload.len(),
            "eligible": is_eligible(leaf, policy),
        }),
    }
}

/// Print a rewrite summary in a human-readable table.
fn print_report_table(
    input: &Path,
    output: &Path,
    input_size: u64,
    output_size: u64,
    report: &RewriteReport,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {} ({})", "Input", input.display(), format_size(input_size, BINARY));
    println!("  {:<20} {} ({})", "Output", output.display(), format_size(output_size, BINARY));
    println!("  {:<20} {}", "Parts", report.leaves);
    println!(
        "  {:<20} {} of {} eligible",
        "Images rewritten",
        report.transformed(),
        report.eligible
    );
    println!("  {:<20} {:.2?}", "Time", elapsed);

    if !report.images.is_empty() {
        println!();
        for image in &report.images {
            println!(
                "    {:<30} {:>11} → {:<11} {:>10} → {}",
                image.filename,
                image.original.to_string(),
                image.output.to_string(),
                format_size(image.size_before, BINARY),
                format_size(image.size_after, BINARY),
            );
        }
    }
    println!();
}

/// Print a rewrite summary as JSON.
fn print_report_json(
    input: &Path,
    output: &Path,
    input_size: u64,
    output_size: u64,
    report: &RewriteReport,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let summary = serde_json::json!({
        "input": input.to_string_lossy(),
        "output": output.to_string_lossy(),
        "input_size": input_size,
        "output_size": output_size,
        "parts": report.leaves,
        "eligible": report.eligible,
        "transformed": report.transformed(),
        "failed": report.failed(),
        "image_bytes_before": report.bytes_before(),
        "image_bytes_after": report.bytes_after(),
        "images": report.images,
        "failures": report.failures,
        "elapsed_ms": elapsed.as_millis(),
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
