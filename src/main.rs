use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use futures_util::future::join_all;
use image_budget::core::sizing::format_file_size;
use image_budget::{
    AlwaysCompress, CompressionConsent, CompressionOptions, FileSource, PreparedImage,
    UploadPreparer,
};

/// Shrink images until they fit a byte budget.
#[derive(Parser, Debug)]
#[command(name = "squeeze")]
#[command(about = "Shrink images to fit a byte budget")]
#[command(long_about = "Shrink PNG, JPEG and WebP images to fit a byte budget by lowering resolution and encoder quality.
Options not given on the command line fall back to IMAGE_BUDGET_* environment variables, then to defaults.")]
struct Args {
    /// Images to prepare
    #[arg(required = true, help = "Input images (PNG, JPEG, WebP; other types are passed through)")]
    inputs: Vec<PathBuf>,

    /// Directory for compressed outputs
    #[arg(short, long, help = "Write outputs here instead of next to each input")]
    output_dir: Option<PathBuf>,

    /// Byte budget
    #[arg(short, long, help = "Byte budget: 1048576, 500k, 2m")]
    target: Option<String>,

    /// Longest-edge cap
    #[arg(short = 'd', long, help = "Longest edge in pixels for the first resolution tier")]
    max_dimension: Option<u32>,

    /// Initial encoder quality
    #[arg(short, long, help = "Initial encoder quality in (0, 1]")]
    quality: Option<f32>,

    /// Lowest encoder quality
    #[arg(long, help = "Lowest encoder quality tried before shrinking")]
    min_quality: Option<f32>,

    /// Quality decrement
    #[arg(long, help = "Quality decrement between attempts")]
    step: Option<f32>,

    /// Compress without asking
    #[arg(short, long, help = "Compress without asking for confirmation")]
    yes: bool,

    /// Never compress
    #[arg(long, help = "Pass every input through unchanged")]
    no_compress: bool,

    /// Print a JSON report per input
    #[arg(long, help = "Print one JSON report per input instead of text")]
    json: bool,

    /// Print the data URL of each result
    #[arg(long, help = "Print the base64 data URL of each result")]
    data_url: bool,

    /// Verbosity
    #[arg(short, long, action = clap::ArgAction::Count, help = "-v for progress, -vv for every attempt")]
    verbose: u8,
}

/// Asks on stdin before compressing each file.
struct PromptConsent;

#[async_trait]
impl CompressionConsent for PromptConsent {
    async fn should_compress(&self, original_size: usize, file_name: &str) -> bool {
        let question = format!(
            "{} is {}. Compress it? [Y/n] ",
            file_name,
            format_file_size(original_size)
        );
        let answer = tokio::task::spawn_blocking(move || {
            use std::io::Write;
            eprint!("{}", question);
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|read| accepts(read, &line))
        })
        .await;
        matches!(answer, Ok(Ok(true)))
    }
}

/// Interpret a prompt answer. Closed stdin declines; an empty line accepts.
fn accepts(bytes_read: usize, line: &str) -> bool {
    if bytes_read == 0 {
        return false;
    }
    !matches!(line.trim().to_lowercase().as_str(), "n" | "no")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let options = build_options(&args)?;
    options.validate().context("invalid compression options")?;

    let failures = if args.yes || args.no_compress {
        let preparer = UploadPreparer::new(AlwaysCompress);
        let jobs = args.inputs.iter().map(|input| process(&preparer, input, &options, &args));
        join_all(jobs).await.into_iter().filter(|ok| !ok).count()
    } else {
        // prompts must not interleave
        let preparer = UploadPreparer::new(PromptConsent);
        let mut failures = 0;
        for input in &args.inputs {
            if !process(&preparer, input, &options, &args).await {
                failures += 1;
            }
        }
        failures
    };

    if failures > 0 {
        anyhow::bail!("{} of {} inputs failed", failures, args.inputs.len());
    }
    Ok(())
}

/// Defaults, then environment, then flags.
fn build_options(args: &Args) -> Result<CompressionOptions> {
    let mut options = CompressionOptions::from_env().context("reading IMAGE_BUDGET_* variables")?;
    if let Some(target) = &args.target {
        options.target_max_bytes = parse_size(target)?;
    }
    if let Some(max_dimension) = args.max_dimension {
        options.max_dimension = max_dimension;
    }
    if let Some(quality) = args.quality {
        options.initial_quality = quality;
    }
    if let Some(min_quality) = args.min_quality {
        options.min_quality = min_quality;
    }
    if let Some(step) = args.step {
        options.quality_step = step;
    }
    if args.no_compress {
        options.ask_to_compress = false;
    }
    Ok(options)
}

/// Parse byte sizes like "1048576", "500k", "2m"
fn parse_size(size: &str) -> Result<usize> {
    let size = size.trim().to_lowercase();
    if let Ok(bytes) = size.parse::<usize>() {
        return Ok(bytes);
    }

    let (num_str, multiplier) = match size.chars().last() {
        Some('k') => (&size[..size.len() - 1], 1024),
        Some('m') => (&size[..size.len() - 1], 1024 * 1024),
        _ => return Err(anyhow::anyhow!("Invalid size: {}. Use bytes or a k/m suffix", size)),
    };
    let num: f64 = num_str
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number in size: {}", num_str))?;
    if !(num.is_finite() && num > 0.0) {
        return Err(anyhow::anyhow!("Size must be positive: {}", size));
    }
    Ok((num * f64::from(multiplier)).round() as usize)
}

/// Prepare one input and report it. Returns false on failure.
async fn process<C: CompressionConsent>(
    preparer: &UploadPreparer<C>,
    input: &Path,
    options: &CompressionOptions,
    args: &Args,
) -> bool {
    let result = async {
        let source = FileSource::new(input);
        let prepared = preparer
            .prepare(&source, options)
            .await
            .with_context(|| format!("preparing {}", input.display()))?;
        let written = if prepared.compressed {
            Some(write_output(&prepared, input, args.output_dir.as_deref()).await?)
        } else {
            None
        };
        report(&prepared, input, written.as_deref(), args)
    }
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("error: {:#}", e);
            false
        }
    }
}

async fn write_output(prepared: &PreparedImage, input: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    let path = output_path(input, prepared, output_dir);
    tokio::fs::write(&path, &prepared.bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// `<stem>.min.<ext>`, next to the input unless a directory is given.
fn output_path(input: &Path, prepared: &PreparedImage, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = prepared.media_type.extension().unwrap_or("bin");
    let file_name = format!("{}.min.{}", stem, ext);
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

fn report(prepared: &PreparedImage, input: &Path, written: Option<&Path>, args: &Args) -> Result<()> {
    if args.json {
        let value = serde_json::json!({
            "input": input.display().to_string(),
            "output": written.map(|p| p.display().to_string()),
            "media_type": prepared.media_type.mime(),
            "compressed": prepared.compressed,
            "original_size": prepared.original_size,
            "final_size": prepared.final_size,
            "width": prepared.dimensions.map(|d| d.w),
            "height": prepared.dimensions.map(|d| d.h),
            "quality": prepared.quality,
            "bypass": prepared.bypass.map(|b| b.as_str()),
            "data_url": args.data_url.then(|| prepared.data_url().into_string()),
        });
        println!("{}", serde_json::to_string(&value)?);
        return Ok(());
    }

    match (written, prepared.dimensions) {
        (Some(path), Some(size)) => println!(
            "{}: {} -> {} ({:.0}% smaller, {}) -> {}",
            input.display(),
            format_file_size(prepared.original_size),
            format_file_size(prepared.final_size),
            (1.0 - prepared.compression_ratio()) * 100.0,
            size,
            path.display()
        ),
        _ => println!(
            "{}: unchanged ({}, {})",
            input.display(),
            format_file_size(prepared.original_size),
            prepared.bypass.map_or("no-improvement", |b| b.as_str())
        ),
    }
    if args.data_url {
        println!("{}", prepared.data_url());
    }
    Ok(())
}
