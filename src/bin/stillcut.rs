use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use stillcut::{
    ClipCodec, ClipCutter, ClipSummary, CutOptions, DetectorMode, FfmpegLogLevel, FrameSource,
    ProgressCallback, ProgressInfo, SourceVideo, VideoSource,
};

const CLI_AFTER_HELP: &str = "Examples:\n  stillcut run 2021-03-01T13:05:00-3-r30.ogv --out clips --progress\n  stillcut run recordings/ --out clips --target-fps 15 --pre-roll 10\n  stillcut probe 2021-03-01T13:05:00-3-r30.ogv --json\n  stillcut completions zsh > _stillcut";

#[derive(Debug, Parser)]
#[command(
    name = "stillcut",
    version,
    about = "Cut fixed-camera recordings down to the moments where something happens",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Cut recordings into clips.
    #[command(
        about = "Cut recordings into clips",
        after_help = "Examples:\n  stillcut run 2021-03-01T13:05:00-3-r30.ogv --out clips\n  stillcut run recordings/ --out clips --ext ogv --no-archive\n  stillcut run input.ogv --out clips --detector difference --min-span 2"
    )]
    Run {
        /// Recording file or a directory of recordings.
        input: String,
        /// Output directory for clips.
        #[arg(long)]
        out: PathBuf,
        /// Frame rate every clip is normalized to.
        #[arg(long, default_value_t = 15)]
        target_fps: u32,
        /// Seconds of quiet padding before and after activity.
        #[arg(long, default_value_t = 10.0)]
        pre_roll: f64,
        /// Discard clips with less than this many seconds of activity.
        #[arg(long, default_value_t = 5.0)]
        min_span: f64,
        /// Change detector: background | difference.
        #[arg(long, default_value = "background")]
        detector: String,
        /// Extension recordings are discovered by in directory mode.
        #[arg(long, default_value = "ogv")]
        ext: String,
        /// Clip file extension.
        #[arg(long, default_value = "avi")]
        clip_ext: String,
        /// Clip codec: mpeg4 | h264.
        #[arg(long, default_value = "mpeg4")]
        codec: String,
        /// Leave processed recordings in place instead of renaming them.
        #[arg(long)]
        no_archive: bool,
        /// Print a machine-readable JSON report instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print what a recording's name and stream declare.
    #[command(
        about = "Inspect a recording",
        after_help = "Examples:\n  stillcut probe 2021-03-01T13:05:00-3-r30.ogv\n  stillcut probe input.ogv --json"
    )]
    Probe {
        /// Recording file path.
        input: String,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_detector_mode(value: &str) -> Option<DetectorMode> {
    match value.to_ascii_lowercase().as_str() {
        "background" | "model" => Some(DetectorMode::BackgroundModel),
        "difference" | "diff" => Some(DetectorMode::FrameDifference),
        _ => None,
    }
}

fn parse_codec(value: &str) -> Option<ClipCodec> {
    match value.to_ascii_lowercase().as_str() {
        "mpeg4" | "mp4v" => Some(ClipCodec::Mpeg4),
        "h264" | "x264" | "avc" => Some(ClipCodec::H264),
        _ => None,
    }
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn discover_sources(input: &Path, extension: &str) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(format!("input not found: {}", input.display()).into());
    }
    let mut sources = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if path.is_file() && matches {
            sources.push(path);
        }
    }
    if sources.is_empty() {
        return Err(format!(
            "no .{extension} recordings in {}",
            input.display()
        )
        .into());
    }
    sources.sort();
    Ok(sources)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        stillcut::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        if let Some(media_time) = info.media_time {
            self.bar
                .set_message(format!("{:.1}s", media_time.as_secs_f64()));
        }
    }

    fn on_clip(&self, summary: &ClipSummary) {
        self.bar.println(format!(
            "{} {} ({:.2} s)",
            "clip".green().bold(),
            summary.path.display(),
            summary.duration.as_secs_f64()
        ));
    }
}

fn process_one(
    cutter: &ClipCutter,
    source: &Path,
    out: &Path,
    archive: bool,
) -> Result<(Vec<ClipSummary>, Option<PathBuf>), Box<dyn std::error::Error>> {
    let clips = cutter.process_file(source, out)?;
    let archived = if archive {
        Some(stillcut::archive_processed(source)?)
    } else {
        None
    };
    Ok((clips, archived))
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Run {
            input,
            out,
            target_fps,
            pre_roll,
            min_span,
            detector,
            ext,
            clip_ext,
            codec,
            no_archive,
            json,
        } => {
            let detector_mode = parse_detector_mode(&detector)
                .ok_or(format!("unsupported --detector: {detector} (background|difference)"))?;
            let clip_codec =
                parse_codec(&codec).ok_or(format!("unsupported --codec: {codec} (mpeg4|h264)"))?;
            let ext_clean = ext.trim_start_matches('.').to_ascii_lowercase();

            let progress = if cli.global.progress && !json {
                let bar = ProgressBar::new(0);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                bar.set_style(style.progress_chars("##-"));
                Some(Arc::new(TerminalProgress { bar }))
            } else {
                None
            };

            let mut options = CutOptions::new()
                .with_target_rate(target_fps)
                .with_pre_roll(Duration::from_secs_f64(pre_roll.max(0.0)))
                .with_min_clip_span(Duration::from_secs_f64(min_span.max(0.0)))
                .with_codec(clip_codec)
                .with_clip_extension(clip_ext.trim_start_matches('.'))
                .with_source_extension(ext_clean.as_str())
                .with_detector_mode(detector_mode);
            if let Some(progress) = &progress {
                options = options.with_progress(Arc::clone(progress) as _);
            }
            let cutter = ClipCutter::new(options);

            let sources = discover_sources(Path::new(&input), &ext_clean)?;
            let mut reports = Vec::new();
            let mut failures = 0_usize;

            for source in &sources {
                if cli.global.verbose {
                    eprintln!("processing {}", source.display());
                }
                match process_one(&cutter, source, &out, !no_archive) {
                    Ok((clips, archived)) => {
                        if json {
                            reports.push(json!({
                                "input": source.display().to_string(),
                                "archived": archived.as_ref().map(|path| path.display().to_string()),
                                "clips": clips.iter().map(|clip| json!({
                                    "path": clip.path.display().to_string(),
                                    "start": clip.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                                    "start_offset_seconds": clip.start_offset.as_secs_f64(),
                                    "duration_seconds": clip.duration.as_secs_f64(),
                                    "frames": clip.frames,
                                })).collect::<Vec<_>>(),
                            }));
                        } else {
                            println!(
                                "{} {}",
                                "success:".green().bold(),
                                format!("{} clip(s) from {}", clips.len(), source.display())
                                    .green()
                            );
                            for clip in &clips {
                                println!(
                                    "  {} ({:.2} s)",
                                    clip.path.display(),
                                    clip.duration.as_secs_f64()
                                );
                            }
                        }
                    }
                    Err(error) => {
                        failures += 1;
                        eprintln!(
                            "{} {}",
                            "error:".red().bold(),
                            format!("{}: {error}", source.display()).red()
                        );
                    }
                }
            }

            if let Some(progress) = progress {
                progress.bar.finish_and_clear();
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
            if failures > 0 {
                return Err(format!("{failures} recording(s) failed").into());
            }
        }
        Commands::Probe { input, json } => {
            let video = SourceVideo::from_path(&input)?;
            let source = VideoSource::open(&input)?;
            let (width, height) = source.dimensions();
            if json {
                let payload = json!({
                    "path": input,
                    "start": video.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    "channel": video.channel,
                    "declared_fps": video.declared_rate,
                    "stream_fps": source.native_rate(),
                    "width": width,
                    "height": height,
                    "frame_count": source.frame_count(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Start: {}", video.start.format("%Y-%m-%d %H:%M:%S"));
                println!("Channel: {}", video.channel);
                println!("Declared rate: {} fps", video.declared_rate);
                println!(
                    "Stream: {}x{} @ {:.2} fps, {} frames",
                    width,
                    height,
                    source.native_rate(),
                    source.frame_count()
                );
                if source.native_rate() as u32 != video.declared_rate {
                    println!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        format!(
                            "stream rate {:.2} does not match declared {}",
                            source.native_rate(),
                            video.declared_rate
                        )
                        .yellow()
                    );
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "stillcut", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
