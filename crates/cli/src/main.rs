//! CLI tool for translating or polishing the text of PowerPoint slides.

mod backend;

use anyhow::{Context, Result};
use backend::CommandBackend;
use clap::Parser;
use slidemob_core::{
    ContentTransformer, PassthroughTransformer, PromptTransformer, RewriteConfig, RewriteOutcome,
    RewriteTask, SlideProgress, StrategyKind, UnknownMarkerPolicy,
};
use slidemob_pptx::{load_slides, Slide, SlideOrchestrator};
use std::path::{Path, PathBuf};

/// Rewrite the text of an extracted .pptx package while keeping its formatting.
#[derive(Parser, Debug)]
#[command(name = "slidemob")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the extracted presentation package
    #[arg(required = true)]
    input: PathBuf,

    /// Directory to write rewritten slide parts to (default: rewrite in place)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target language, e.g. "German"
    #[arg(short, long)]
    language: Option<String>,

    /// Style instructions passed to the backend
    #[arg(short, long)]
    style: Option<String>,

    /// Alignment strategy: markers or segment-mapping
    #[arg(long)]
    strategy: Option<String>,

    /// Do not merge identically formatted runs before rewriting
    #[arg(long)]
    no_merge: bool,

    /// Set the language tag of rewritten runs to the target language
    #[arg(long)]
    update_language: bool,

    /// Keep a paragraph unchanged when the backend invents marker ids
    #[arg(long)]
    strict_markers: bool,

    /// Only process these slide parts (e.g. slide3.xml); repeatable
    #[arg(long = "slide")]
    slides: Vec<String>,

    /// Command that answers prompts: reads stdin, writes the reply to stdout.
    /// Without it, text is passed through unchanged.
    #[arg(short, long)]
    backend: Option<String>,

    /// Polish text in its own language instead of translating it
    #[arg(long)]
    polish: bool,

    /// The backend is a reasoning model that emits <think> blocks
    #[arg(long)]
    reasoning: bool,

    /// Stop cleanly once this file exists
    #[arg(long)]
    stop_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let config = build_config(&args)?;
    let transformer = build_transformer(&args)?;

    let mut slides = load_slides(&args.input)
        .with_context(|| format!("Failed to load slides from {}", args.input.display()))?;
    if args.verbose {
        eprintln!("Found {} slides in {}", slides.len(), args.input.display());
    }

    let stop_file = args.stop_file.clone();
    let stop = move || stop_file.as_deref().is_some_and(Path::exists);
    let mut progress = |p: &SlideProgress| {
        eprintln!("[{}/{}] {}", p.index, p.total, p.slide_name);
    };

    let outcome = SlideOrchestrator::new(&config, transformer.as_ref())
        .process_slides(&mut slides, &mut progress, &stop)
        .context("Rewrite failed")?;

    write_slides(&slides, &config, &args.input, args.output.as_deref())?;
    report(&outcome);

    Ok(())
}

/// Load the configuration file, if any, and apply command-line overrides.
fn build_config(args: &Args) -> Result<RewriteConfig> {
    let mut config = match &args.config {
        Some(path) => RewriteConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => RewriteConfig::new(),
    };

    if let Some(language) = &args.language {
        config = config.with_target_language(language.clone());
    }
    if let Some(style) = &args.style {
        config = config.with_style_instructions(style.clone());
    }
    if let Some(name) = &args.strategy {
        let strategy = StrategyKind::from_name(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown strategy '{}'", name))?;
        config = config.with_strategy(strategy);
    }
    if args.no_merge {
        config = config.with_merge_runs(false);
    }
    if args.update_language {
        config = config.with_update_language(true);
    }
    if args.strict_markers {
        config = config.with_unknown_marker_policy(UnknownMarkerPolicy::Strict);
    }
    if !args.slides.is_empty() {
        config = config.with_slides(args.slides.iter().cloned());
    }

    log::debug!("Configuration: {:?}", config);
    Ok(config)
}

fn build_transformer(args: &Args) -> Result<Box<dyn ContentTransformer>> {
    let Some(command) = &args.backend else {
        log::info!("No backend given; passing text through unchanged");
        return Ok(Box::new(PassthroughTransformer));
    };

    let backend = CommandBackend::from_command_line(command)
        .ok_or_else(|| anyhow::anyhow!("Backend command is empty"))?;
    let task = if args.polish {
        RewriteTask::Polish
    } else {
        RewriteTask::Translate
    };

    Ok(Box::new(
        PromptTransformer::new(backend)
            .with_task(task)
            .with_reasoning(args.reasoning),
    ))
}

/// Write processed slides back, either in place or mirrored under `output`.
fn write_slides(
    slides: &[Slide],
    config: &RewriteConfig,
    input: &Path,
    output: Option<&Path>,
) -> Result<()> {
    for slide in slides.iter().filter(|s| config.includes_slide(&s.name)) {
        let Some(source) = &slide.path else {
            continue;
        };
        let target = output_path(source, input, output);
        slide
            .save(&target)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        log::debug!("Written to: {}", target.display());
    }
    Ok(())
}

/// Determine where a slide loaded from `source` is written.
fn output_path(source: &Path, input: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(dir) => match source.strip_prefix(input) {
            Ok(relative) => dir.join(relative),
            Err(_) => dir.join(source.file_name().unwrap_or(source.as_os_str())),
        },
        None => source.to_path_buf(),
    }
}

fn report(outcome: &RewriteOutcome) {
    let summary = outcome.summary();
    if outcome.is_cancelled() {
        eprintln!("Stopped early; slides processed so far were written.");
    }
    eprintln!(
        "{} slides, {} paragraphs rewritten, {} kept original, {} skipped",
        summary.slides_processed,
        summary.paragraphs_rewritten,
        summary.paragraphs_degraded,
        summary.paragraphs_skipped
    );
}
