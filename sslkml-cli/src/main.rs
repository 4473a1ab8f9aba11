use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::ThreadPoolBuilder;
use sslkml::kmz::{is_kmz, KmzHandler};
use sslkml::{convert_kml, ConvertOptions, MapType, TransformReport};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "SSL Karttarekisteri KML tool", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one KML or KMZ file (stdin to stdout by default)
    Convert(ConvertArgs),
    /// Convert every KML/KMZ file under a directory
    Batch(BatchArgs),
    /// Download and convert map lists from the registry
    Download(DownloadArgs),
}

#[derive(Args, Debug)]
struct LabelArgs {
    /// Map type whose label is prefixed to green map names
    #[arg(long, value_name = "TYPE", conflicts_with = "label")]
    map_type: Option<MapType>,

    /// Custom label prefixed to green map names
    #[arg(long, value_name = "TEXT")]
    label: Option<String>,
}

impl LabelArgs {
    fn options(&self) -> ConvertOptions {
        match (&self.label, self.map_type) {
            (Some(label), _) => ConvertOptions::with_label(label.as_str()),
            (None, Some(map_type)) => ConvertOptions::for_map_type(map_type),
            (None, None) => ConvertOptions::default(),
        }
    }
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input KML or KMZ file, stdin when omitted
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output KML file, stdout when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[command(flatten)]
    label: LabelArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Directory searched recursively for .kml and .kmz files
    #[arg(value_name = "DIR")]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short, long)]
    threads: Option<usize>,

    #[command(flatten)]
    label: LabelArgs,
}

#[derive(Args, Debug)]
struct DownloadArgs {
    /// Map types to download, or "all"
    #[arg(value_name = "TYPE", default_value = "all")]
    types: Vec<String>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout may carry KML, so logs go to stderr
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let start_time = std::time::Instant::now();

    match &cli.command {
        Command::Convert(args) => convert(args)?,
        Command::Batch(args) => batch(args)?,
        Command::Download(args) => download(args)?,
    }

    info!("Total processing time: {:?}", start_time.elapsed());
    Ok(())
}

fn convert(args: &ConvertArgs) -> Result<()> {
    let input = match &args.input {
        Some(path) => read_input(path)?,
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    // Buffer the result so a failed run never leaves a partial output file
    let mut output = Vec::new();
    let report = convert_kml(input.as_slice(), &mut output, &args.label.options())
        .context("Failed to convert KML")?;
    log_dropped(&report);

    match &args.output {
        Some(path) => {
            fs::write(path, &output).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Written: {:?}", path);
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn batch(args: &BatchArgs) -> Result<()> {
    use rayon::prelude::*;

    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    if !args.input.is_dir() {
        error!("Invalid input path: {:?}", args.input);
        anyhow::bail!("Input path must be a directory");
    }
    fs::create_dir_all(&args.output)?;

    let input_files = collect_input_files(&args.input)?;
    info!("Found {} input files (KML/KMZ)", input_files.len());

    let jobs = plan_outputs(&args.input, &input_files, &args.output)?;

    let options = args.label.options();
    let results: Vec<Result<()>> = jobs
        .par_iter()
        .map(|(path, output_path)| process_file(path, output_path, &options))
        .collect();

    let mut errors = Vec::new();
    for (path, result) in input_files.iter().zip(results) {
        if let Err(e) = result {
            errors.push(format!("{}: {:#}", path.display(), e));
        }
    }

    if !errors.is_empty() {
        error!("Failed to process {} files:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        anyhow::bail!("{} files failed to process", errors.len());
    }

    Ok(())
}

/// Pairs every input with its output path, mirroring the input tree under
/// `output_dir`. Two inputs that map to one output (`a.kml` and `a.kmz`) are
/// rejected before anything is written.
fn plan_outputs(
    input_dir: &Path,
    input_files: &[PathBuf],
    output_dir: &Path,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut jobs = Vec::with_capacity(input_files.len());
    let mut targets: HashMap<PathBuf, &Path> = HashMap::new();

    for path in input_files {
        let relative = path
            .strip_prefix(input_dir)
            .with_context(|| format!("{:?} is not under {:?}", path, input_dir))?;
        let output_path = output_dir.join(relative).with_extension("kml");
        if let Some(previous) = targets.insert(output_path.clone(), path.as_path()) {
            error!("{:?} and {:?} both convert to {:?}", previous, path, output_path);
            anyhow::bail!(
                "Conflicting inputs for {}: {} and {}",
                output_path.display(),
                previous.display(),
                path.display()
            );
        }
        jobs.push((path.clone(), output_path));
    }

    Ok(jobs)
}

fn process_file(path: &Path, output_path: &Path, options: &ConvertOptions) -> Result<()> {
    info!("Processing file: {:?}", path);

    let input = read_input(path)?;
    let mut output = Vec::new();
    let report = convert_kml(input.as_slice(), &mut output, options)?;
    log_dropped(&report);

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, &output)
        .with_context(|| format!("Failed to write {:?}", output_path))?;
    info!("Written: {:?}", output_path);

    Ok(())
}

fn collect_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(collect_input_files(&path)?);
            continue;
        }
        let is_input = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("kml") || ext.eq_ignore_ascii_case("kmz"));
        if is_input {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn download(args: &DownloadArgs) -> Result<()> {
    let map_types = resolve_map_types(&args.types)?;
    fs::create_dir_all(&args.output)?;

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .context("Failed to build HTTP client")?;
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();

    for map_type in map_types {
        let url = map_type.download_url();
        let output_path = args
            .output
            .join(format!("ssl-{}-{}.kml", map_type.key(), timestamp));
        info!(
            "Downloading and converting {} from {} to {:?}",
            map_type, url, output_path
        );

        let body = client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .with_context(|| format!("Failed to download {}", url))?;

        let mut output = Vec::new();
        let report = convert_kml(
            &body[..],
            &mut output,
            &ConvertOptions::for_map_type(map_type),
        )
        .with_context(|| format!("Failed to convert {} map list", map_type))?;
        log_dropped(&report);

        fs::write(&output_path, &output)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        info!("{:?} created", output_path);
    }

    info!("All done.");
    Ok(())
}

fn resolve_map_types(types: &[String]) -> Result<Vec<MapType>> {
    if types.is_empty() || types.iter().any(|t| t == "all") {
        info!("Downloading all map types");
        return Ok(MapType::ALL.to_vec());
    }

    let mut map_types = Vec::new();
    for key in types {
        let map_type: MapType = key.parse()?;
        if !map_types.contains(&map_type) {
            map_types.push(map_type);
        }
    }
    Ok(map_types)
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if is_kmz(path) {
        KmzHandler::new(path)
            .read_kml()
            .with_context(|| format!("Failed to read KMZ {:?}", path))
    } else {
        fs::read(path).with_context(|| format!("Failed to read {:?}", path))
    }
}

fn log_dropped(report: &TransformReport) {
    for dropped in &report.dropped_shapes {
        warn!(
            "Polygon of map {} removed: {}",
            dropped.map_id.as_deref().unwrap_or("<unnamed>"),
            dropped.error
        );
    }
}
