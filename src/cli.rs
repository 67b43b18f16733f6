use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;

use clap::{Args, Parser, Subcommand};

use crate::core::builder::{build_args, INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER};
use crate::core::error::RunError;
use crate::core::event::RunnerEvent;
use crate::core::formatter::{format_bytes, format_command, format_duration};
use crate::core::job::{ExtraArg, JobMode, JobSpec};
use crate::core::probe::probe_media;
use crate::core::runner;
use crate::core::suggest::suggest_output_path;

#[derive(Debug, Parser)]
#[command(
    name = "ffjob",
    version,
    about = "FFmpeg job composer with command preview and progress tracking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the ffmpeg command a job would run, without running it
    Preview(JobArgs),
    /// Run a job and stream its progress (type q to stop)
    Run(RunArgs),
    /// Suggest an output path for an input file and preset
    Suggest(SuggestArgs),
    /// Inspect an input file with ffprobe
    Probe(ProbeArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub job: JobArgs,
    /// Echo every ffmpeg log line to stderr
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[arg(short = 'i', long = "input")]
    pub input: String,
    #[arg(long)]
    pub preset: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[arg(short = 'i', long = "input")]
    pub input: String,
    #[arg(long = "ffprobe-path")]
    pub ffprobe_path: Option<String>,
}

/// Every JobSpec field as a flag. `--job FILE` loads a camelCase JSON
/// job first; explicit flags then override what the file set.
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job mode: preset, visual or raw
    #[arg(long)]
    pub mode: Option<String>,
    #[arg(long = "job", value_name = "FILE")]
    pub job_file: Option<PathBuf>,
    #[arg(short = 'i', long = "input")]
    pub input: Option<String>,
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,
    #[arg(long)]
    pub preset: Option<String>,
    /// Raw-mode argument template with {input}/{output} placeholders
    #[arg(long = "raw-args", allow_hyphen_values = true)]
    pub raw_args: Option<String>,
    #[arg(long = "start")]
    pub start_time: Option<String>,
    #[arg(long)]
    pub duration: Option<String>,
    #[arg(long)]
    pub crf: Option<f64>,
    #[arg(long = "speed-preset")]
    pub speed_preset: Option<String>,
    #[arg(long = "vcodec")]
    pub video_codec: Option<String>,
    #[arg(long = "acodec")]
    pub audio_codec: Option<String>,
    #[arg(long = "pix-fmt")]
    pub pixel_format: Option<String>,
    #[arg(long = "video-bitrate")]
    pub video_bitrate: Option<String>,
    #[arg(long = "audio-bitrate")]
    pub audio_bitrate: Option<String>,
    #[arg(long = "audio-quality")]
    pub audio_quality: Option<String>,
    #[arg(long)]
    pub fps: Option<f64>,
    #[arg(long = "scale-width")]
    pub scale_width: Option<f64>,
    #[arg(long = "scale-height")]
    pub scale_height: Option<f64>,
    #[arg(long = "sample-rate")]
    pub sample_rate: Option<f64>,
    #[arg(long)]
    pub channels: Option<f64>,
    #[arg(long)]
    pub threads: Option<f64>,
    #[arg(long)]
    pub format: Option<String>,
    #[arg(long = "map")]
    pub map_spec: Option<String>,
    #[arg(long = "loop")]
    pub loop_value: Option<String>,
    #[arg(long = "vf")]
    pub video_filter: Option<String>,
    #[arg(long = "faststart")]
    pub movflags_faststart: bool,
    #[arg(long = "no-overwrite")]
    pub no_overwrite: bool,
    #[arg(long = "no-video")]
    pub disable_video: bool,
    #[arg(long = "no-audio")]
    pub disable_audio: bool,
    /// Extra -key=value pair appended after the structured flags; repeatable
    #[arg(long = "extra", value_name = "KEY=VALUE", allow_hyphen_values = true)]
    pub extra: Vec<String>,
    #[arg(long = "ffmpeg-path")]
    pub ffmpeg_path: Option<String>,
    #[arg(long = "ffprobe-path")]
    pub ffprobe_path: Option<String>,
}

fn parse_extra_entry(entry: &str) -> ExtraArg {
    let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
    ExtraArg {
        key: Some(key.to_string()),
        value: Some(value.to_string()),
        enabled: None,
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

impl JobArgs {
    pub fn to_job(&self) -> Result<JobSpec, RunError> {
        let mut job = match &self.job_file {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => JobSpec::default(),
        };

        if let Some(mode) = &self.mode {
            job.mode = JobMode::parse(mode);
        }

        if self.input.is_some() {
            job.input_path = self.input.clone();
        }
        if self.output.is_some() {
            job.output_path = self.output.clone();
        }
        if self.preset.is_some() {
            job.preset = self.preset.clone();
        }
        if self.raw_args.is_some() {
            job.raw_args = self.raw_args.clone();
        }
        if self.start_time.is_some() {
            job.start_time = self.start_time.clone();
        }
        if self.duration.is_some() {
            job.duration = self.duration.clone();
        }
        if self.crf.is_some() {
            job.crf = self.crf;
        }
        if self.speed_preset.is_some() {
            job.speed_preset = self.speed_preset.clone();
        }
        if self.video_codec.is_some() {
            job.video_codec = self.video_codec.clone();
        }
        if self.audio_codec.is_some() {
            job.audio_codec = self.audio_codec.clone();
        }
        if self.pixel_format.is_some() {
            job.pixel_format = self.pixel_format.clone();
        }
        if self.video_bitrate.is_some() {
            job.video_bitrate = self.video_bitrate.clone();
        }
        if self.audio_bitrate.is_some() {
            job.audio_bitrate = self.audio_bitrate.clone();
        }
        if self.audio_quality.is_some() {
            job.audio_quality = self.audio_quality.clone();
        }
        if self.fps.is_some() {
            job.fps = self.fps;
        }
        if self.scale_width.is_some() {
            job.scale_width = self.scale_width;
        }
        if self.scale_height.is_some() {
            job.scale_height = self.scale_height;
        }
        if self.sample_rate.is_some() {
            job.sample_rate = self.sample_rate;
        }
        if self.channels.is_some() {
            job.channels = self.channels;
        }
        if self.threads.is_some() {
            job.threads = self.threads;
        }
        if self.format.is_some() {
            job.format = self.format.clone();
        }
        if self.map_spec.is_some() {
            job.map_spec = self.map_spec.clone();
        }
        if self.loop_value.is_some() {
            job.loop_value = self.loop_value.clone();
        }
        if self.video_filter.is_some() {
            job.video_filter = self.video_filter.clone();
        }
        if self.ffmpeg_path.is_some() {
            job.ffmpeg_path = self.ffmpeg_path.clone();
        }
        if self.ffprobe_path.is_some() {
            job.ffprobe_path = self.ffprobe_path.clone();
        }

        if self.movflags_faststart {
            job.movflags_faststart = Some(true);
        }
        if self.no_overwrite {
            job.overwrite = Some(false);
        }
        if self.disable_video {
            job.disable_video = Some(true);
        }
        if self.disable_audio {
            job.disable_audio = Some(true);
        }

        if !self.extra.is_empty() {
            job.extra_args = Some(self.extra.iter().map(|e| parse_extra_entry(e)).collect());
        }

        Ok(job)
    }
}

pub fn execute(command: Commands) -> Result<(), RunError> {
    match command {
        Commands::Preview(args) => preview(&args),
        Commands::Run(args) => run(&args),
        Commands::Suggest(args) => {
            let preset = args.preset.as_deref().unwrap_or("h264");
            println!("{}", suggest_output_path(&args.input, preset));
            Ok(())
        }
        Commands::Probe(args) => probe(&args),
    }
}

fn preview(args: &JobArgs) -> Result<(), RunError> {
    let mut job = args.to_job()?;

    // A half-filled job still previews: blank paths show up as the
    // literal placeholders instead of failing validation.
    if is_blank(&job.input_path) {
        job.input_path = Some(INPUT_PLACEHOLDER.to_string());
    }
    if is_blank(&job.output_path) {
        job.output_path = Some(OUTPUT_PLACEHOLDER.to_string());
    }

    let argv = build_args(&job)?;
    println!(
        "{}",
        format_command(job.ffmpeg_path.as_deref().unwrap_or(""), &argv)
    );
    Ok(())
}

fn run(args: &RunArgs) -> Result<(), RunError> {
    let job = args.job.to_job()?;
    let events = runner::start(&job)?;

    // q/stop on stdin kills the child; the runner then reports Stopped.
    thread::spawn(|| {
        let stdin = io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            let trimmed = line.trim();
            if trimmed.eq_ignore_ascii_case("q") || trimmed.eq_ignore_ascii_case("stop") {
                runner::stop();
                break;
            }
        }
    });

    let mut stdout = io::stdout();
    for event in events {
        match event {
            RunnerEvent::Log(line) => {
                if args.verbose {
                    eprintln!("{line}");
                }
            }
            RunnerEvent::Progress(sample) => {
                let line = match sample.ratio {
                    Some(ratio) => format!(
                        "progress: {} ({:.0}%)",
                        format_duration(sample.current_time_sec),
                        ratio * 100.0
                    ),
                    None => format!("progress: {}", format_duration(sample.current_time_sec)),
                };
                print!("\r{line}");
                let _ = stdout.flush();
            }
            RunnerEvent::Completed => {
                println!();
                println!("done");
                return Ok(());
            }
            RunnerEvent::Stopped => {
                println!();
                println!("stopped");
                return Ok(());
            }
            RunnerEvent::Failed(message) => {
                println!();
                return Err(RunError::Tool {
                    tool: "ffmpeg",
                    message,
                });
            }
        }
    }

    Ok(())
}

fn probe(args: &ProbeArgs) -> Result<(), RunError> {
    let ffprobe = runner::resolve_executable(args.ffprobe_path.as_deref(), "ffprobe");
    let info = probe_media(&ffprobe, &args.input)?;

    println!("file     : {}", info.file);
    println!(
        "format   : {}",
        if info.format_name.is_empty() {
            "unknown"
        } else {
            &info.format_name
        }
    );
    println!(
        "duration : {}",
        info.duration_sec
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!(
        "size     : {}",
        info.size_bytes
            .map(format_bytes)
            .unwrap_or_else(|| "unknown".to_string())
    );
    if let Some(bit_rate) = info.bit_rate {
        println!("bitrate  : {:.1} kb/s", bit_rate / 1000.0);
    }

    for stream in &info.streams {
        let mut details: Vec<String> = Vec::new();
        if let Some(codec) = &stream.codec_name {
            details.push(codec.clone());
        }
        if let (Some(width), Some(height)) = (stream.width, stream.height) {
            details.push(format!("{width}x{height}"));
        }
        if let Some(rate) = stream.sample_rate {
            details.push(format!("{rate} Hz"));
        }
        if let Some(channels) = stream.channels {
            details.push(format!("{channels} ch"));
        }
        if let Some(bit_rate) = stream.bit_rate {
            details.push(format!("{:.1} kb/s", bit_rate / 1000.0));
        }
        println!(
            "stream {} : {} {}",
            stream.index.unwrap_or_default(),
            stream.codec_type.as_deref().unwrap_or("unknown"),
            details.join(" ")
        );
    }

    Ok(())
}
