use crate::core::error::JobError;
use crate::core::job::{JobMode, JobSpec};
use crate::core::tokenize::split_command_line;

pub const INPUT_PLACEHOLDER: &str = "{input}";
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Fallback parameters applied per preset wherever a visual-mode job
/// leaves a field unset. An explicit override always wins.
#[derive(Debug, Clone, Copy, Default)]
struct PresetDefaults {
    video_codec: Option<&'static str>,
    speed_preset: Option<&'static str>,
    crf: Option<f64>,
    audio_codec: Option<&'static str>,
    audio_bitrate: Option<&'static str>,
    audio_quality: Option<&'static str>,
    disable_video: bool,
    disable_audio: bool,
    fps: Option<f64>,
    scale_width: Option<f64>,
    scale_height: Option<f64>,
    loop_value: Option<&'static str>,
}

fn preset_defaults(preset: &str) -> PresetDefaults {
    match preset {
        "h265" => PresetDefaults {
            video_codec: Some("libx265"),
            speed_preset: Some("medium"),
            crf: Some(28.0),
            audio_codec: Some("aac"),
            audio_bitrate: Some("160k"),
            ..Default::default()
        },
        "mp3" => PresetDefaults {
            audio_codec: Some("libmp3lame"),
            audio_quality: Some("2"),
            disable_video: true,
            ..Default::default()
        },
        "gif" => PresetDefaults {
            disable_audio: true,
            fps: Some(12.0),
            scale_width: Some(480.0),
            loop_value: Some("0"),
            ..Default::default()
        },
        // Unknown preset names in visual mode are lenient and borrow
        // the h264 row; preset mode rejects them before getting here.
        _ => PresetDefaults {
            video_codec: Some("libx264"),
            speed_preset: Some("medium"),
            crf: Some(23.0),
            audio_codec: Some("aac"),
            audio_bitrate: Some("192k"),
            ..Default::default()
        },
    }
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

/// Override-or-default resolution shared by every visual-mode field:
/// a present, non-blank override wins, else the preset default, else "".
fn pick_text<'a>(explicit: &'a Option<String>, fallback: Option<&'a str>) -> &'a str {
    let explicit = text(explicit);
    if !explicit.is_empty() {
        explicit
    } else {
        fallback.unwrap_or("")
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn round_positive(value: Option<f64>) -> Option<i64> {
    finite(value)
        .filter(|v| *v > 0.0)
        .map(|v| v.round() as i64)
}

/// Renders a number the way the front end's values stringify: integral
/// values drop the fraction, everything else keeps it.
fn number_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn push_pair(args: &mut Vec<String>, key: &str, value: &str) {
    args.push(key.to_string());
    args.push(value.to_string());
}

fn push_trim_flags(args: &mut Vec<String>, start_time: &str, duration: &str) {
    if !start_time.is_empty() {
        push_pair(args, "-ss", start_time);
    }

    if !duration.is_empty() {
        push_pair(args, "-t", duration);
    }
}

fn push_pair_if_text(args: &mut Vec<String>, key: &str, value: &Option<String>) {
    let value = text(value);
    if !value.is_empty() {
        push_pair(args, key, value);
    }
}

/// Maps a job to the exact ffmpeg argument vector. Pure: the job is
/// never mutated and no partial vector is ever returned.
pub fn build_args(job: &JobSpec) -> Result<Vec<String>, JobError> {
    match job.mode {
        JobMode::Raw => build_raw(job),
        JobMode::Visual => build_visual(job),
        JobMode::Preset => build_preset(job),
    }
}

fn build_preset(job: &JobSpec) -> Result<Vec<String>, JobError> {
    let preset = pick_text(&job.preset, Some("h264"));
    let input_path = text(&job.input_path);
    let output_path = text(&job.output_path);

    if input_path.is_empty() || output_path.is_empty() {
        return Err(JobError::MissingPaths);
    }

    let mut args = vec!["-y".to_string()];
    push_trim_flags(&mut args, text(&job.start_time), text(&job.duration));
    push_pair(&mut args, "-i", input_path);

    match preset {
        "h264" => {
            push_pair(&mut args, "-c:v", "libx264");
            push_pair(&mut args, "-preset", "medium");
            push_pair(&mut args, "-crf", &number_text(finite(job.crf).unwrap_or(23.0)));
            push_pair(&mut args, "-c:a", "aac");
            push_pair(&mut args, "-b:a", "192k");
        }
        "h265" => {
            push_pair(&mut args, "-c:v", "libx265");
            push_pair(&mut args, "-preset", "medium");
            push_pair(&mut args, "-crf", &number_text(finite(job.crf).unwrap_or(23.0)));
            push_pair(&mut args, "-c:a", "aac");
            push_pair(&mut args, "-b:a", "160k");
        }
        "mp3" => {
            args.push("-vn".to_string());
            push_pair(&mut args, "-c:a", "libmp3lame");
            push_pair(&mut args, "-q:a", "2");
        }
        "gif" => {
            let fps = finite(job.fps).unwrap_or(12.0);
            let width = finite(job.scale_width).unwrap_or(480.0);
            push_pair(
                &mut args,
                "-vf",
                &format!(
                    "fps={},scale={}:-1:flags=lanczos",
                    number_text(fps),
                    number_text(width)
                ),
            );
            push_pair(&mut args, "-loop", "0");
        }
        other => return Err(JobError::UnsupportedPreset(other.to_string())),
    }

    args.push(output_path.to_string());
    Ok(args)
}

fn build_raw(job: &JobSpec) -> Result<Vec<String>, JobError> {
    let raw_args = text(&job.raw_args);
    if raw_args.is_empty() {
        return Err(JobError::EmptyRawArgs);
    }

    let tokens = split_command_line(raw_args)?;
    let input_path = text(&job.input_path);
    let output_path = text(&job.output_path);

    if tokens.iter().any(|token| token.contains(INPUT_PLACEHOLDER)) && input_path.is_empty() {
        return Err(JobError::MissingPlaceholderPath {
            field: "inputPath",
            placeholder: INPUT_PLACEHOLDER,
        });
    }

    if tokens.iter().any(|token| token.contains(OUTPUT_PLACEHOLDER)) && output_path.is_empty() {
        return Err(JobError::MissingPlaceholderPath {
            field: "outputPath",
            placeholder: OUTPUT_PLACEHOLDER,
        });
    }

    // Substring substitution, not whole-token matching: templates like
    // file:{output} are valid and must keep working.
    Ok(tokens
        .into_iter()
        .map(|token| {
            token
                .replace(INPUT_PLACEHOLDER, input_path)
                .replace(OUTPUT_PLACEHOLDER, output_path)
        })
        .collect())
}

fn build_visual(job: &JobSpec) -> Result<Vec<String>, JobError> {
    let input_path = text(&job.input_path);
    let output_path = text(&job.output_path);

    if input_path.is_empty() || output_path.is_empty() {
        return Err(JobError::MissingPaths);
    }

    let defaults = preset_defaults(pick_text(&job.preset, Some("h264")));
    let mut args: Vec<String> = Vec::new();

    if job.overwrite.unwrap_or(true) {
        args.push("-y".to_string());
    }

    push_trim_flags(&mut args, text(&job.start_time), text(&job.duration));
    push_pair(&mut args, "-i", input_path);

    let disable_video = job.disable_video.unwrap_or(false) || defaults.disable_video;
    let disable_audio = job.disable_audio.unwrap_or(false) || defaults.disable_audio;

    let video_codec = pick_text(&job.video_codec, defaults.video_codec);
    let audio_codec = pick_text(&job.audio_codec, defaults.audio_codec);

    if disable_video || video_codec == "none" {
        args.push("-vn".to_string());
    } else {
        if !video_codec.is_empty() && video_codec != "auto" {
            push_pair(&mut args, "-c:v", video_codec);
        }

        let speed_preset = pick_text(&job.speed_preset, defaults.speed_preset);
        if !speed_preset.is_empty() && video_codec != "copy" {
            push_pair(&mut args, "-preset", speed_preset);
        }

        if let Some(crf) = finite(job.crf).or(defaults.crf) {
            if video_codec != "copy" {
                push_pair(&mut args, "-crf", &number_text(crf));
            }
        }

        push_pair_if_text(&mut args, "-b:v", &job.video_bitrate);
    }

    if disable_audio || audio_codec == "none" {
        args.push("-an".to_string());
    } else {
        if !audio_codec.is_empty() && audio_codec != "auto" {
            push_pair(&mut args, "-c:a", audio_codec);
        }

        let audio_bitrate = pick_text(&job.audio_bitrate, defaults.audio_bitrate);
        if !audio_bitrate.is_empty() {
            push_pair(&mut args, "-b:a", audio_bitrate);
        }

        let audio_quality = pick_text(&job.audio_quality, defaults.audio_quality);
        if !audio_quality.is_empty() {
            push_pair(&mut args, "-q:a", audio_quality);
        }

        if let Some(sample_rate) = round_positive(job.sample_rate) {
            push_pair(&mut args, "-ar", &sample_rate.to_string());
        }

        if let Some(channels) = round_positive(job.channels) {
            push_pair(&mut args, "-ac", &channels.to_string());
        }
    }

    let mut filters: Vec<String> = Vec::new();

    if let Some(fps) = finite(job.fps).or(defaults.fps) {
        if fps > 0.0 {
            filters.push(format!("fps={}", number_text(fps)));
        }
    }

    let scale_width = finite(job.scale_width).or(defaults.scale_width);
    let scale_height = finite(job.scale_height).or(defaults.scale_height);
    if scale_width.is_some() || scale_height.is_some() {
        let width = scale_width.map(|v| v.round() as i64).unwrap_or(-1);
        let height = scale_height.map(|v| v.round() as i64).unwrap_or(-1);
        filters.push(format!("scale={width}:{height}:flags=lanczos"));
    }

    let video_filter = text(&job.video_filter);
    if !video_filter.is_empty() {
        filters.push(video_filter.to_string());
    }

    if !filters.is_empty() {
        push_pair(&mut args, "-vf", &filters.join(","));
    }

    // A present-but-blank loop falls back to the preset default; a
    // falsy-but-present value such as "0" wins over the default.
    let loop_value = pick_text(&job.loop_value, defaults.loop_value);
    if !loop_value.is_empty() {
        push_pair(&mut args, "-loop", loop_value);
    }

    push_pair_if_text(&mut args, "-pix_fmt", &job.pixel_format);

    if job.movflags_faststart.unwrap_or(false) {
        push_pair(&mut args, "-movflags", "+faststart");
    }

    if let Some(threads) = round_positive(job.threads) {
        push_pair(&mut args, "-threads", &threads.to_string());
    }

    push_pair_if_text(&mut args, "-f", &job.format);
    push_pair_if_text(&mut args, "-map", &job.map_spec);

    for option in job.extra_args.iter().flatten() {
        if option.enabled == Some(false) {
            continue;
        }

        let key = text(&option.key);
        if key.is_empty() {
            continue;
        }

        if key.starts_with('-') {
            args.push(key.to_string());
        } else {
            args.push(format!("-{key}"));
        }

        let value = text(&option.value);
        if !value.is_empty() {
            args.push(value.to_string());
        }
    }

    args.push(output_path.to_string());
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::ExtraArg;

    fn preset_job(preset: &str) -> JobSpec {
        JobSpec {
            preset: Some(preset.to_string()),
            input_path: Some("/tmp/in.mov".to_string()),
            output_path: Some("/tmp/out.bin".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn h264_preset_emits_documented_flags() {
        let args = build_args(&preset_job("h264")).expect("build failed");
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/tmp/in.mov", "-c:v", "libx264", "-preset", "medium", "-crf",
                "23", "-c:a", "aac", "-b:a", "192k", "/tmp/out.bin",
            ]
        );
    }

    #[test]
    fn h265_preset_emits_documented_flags() {
        let mut job = preset_job("h265");
        job.crf = Some(26.0);
        let args = build_args(&job).expect("build failed");
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/tmp/in.mov", "-c:v", "libx265", "-preset", "medium", "-crf",
                "26", "-c:a", "aac", "-b:a", "160k", "/tmp/out.bin",
            ]
        );
    }

    #[test]
    fn mp3_preset_emits_documented_flags() {
        let args = build_args(&preset_job("mp3")).expect("build failed");
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/tmp/in.mov", "-vn", "-c:a", "libmp3lame", "-q:a", "2",
                "/tmp/out.bin",
            ]
        );
    }

    #[test]
    fn gif_preset_emits_documented_flags() {
        let args = build_args(&preset_job("gif")).expect("build failed");
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/tmp/in.mov",
                "-vf",
                "fps=12,scale=480:-1:flags=lanczos",
                "-loop",
                "0",
                "/tmp/out.bin",
            ]
        );
    }

    #[test]
    fn gif_preset_keeps_fractional_fps() {
        let mut job = preset_job("gif");
        job.fps = Some(12.5);
        job.scale_width = Some(640.4);
        let args = build_args(&job).expect("build failed");
        assert!(args.contains(&"fps=12.5,scale=640.4:-1:flags=lanczos".to_string()));
    }

    #[test]
    fn empty_preset_falls_back_to_h264() {
        let mut job = preset_job("h264");
        job.preset = None;
        let args = build_args(&job).expect("build failed");
        assert!(args.contains(&"libx264".to_string()));
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let err = build_args(&preset_job("webm")).expect_err("expected failure");
        assert_eq!(err, JobError::UnsupportedPreset("webm".to_string()));
        assert!(err.to_string().contains("webm"));
    }

    #[test]
    fn preset_mode_requires_both_paths() {
        let mut job = preset_job("h264");
        job.output_path = None;
        assert_eq!(build_args(&job), Err(JobError::MissingPaths));

        let mut job = preset_job("h264");
        job.input_path = Some("   ".to_string());
        assert_eq!(build_args(&job), Err(JobError::MissingPaths));
    }

    #[test]
    fn trim_flags_appear_only_when_set_and_in_order() {
        let mut job = preset_job("mp3");
        job.start_time = Some("00:00:05".to_string());
        let args = build_args(&job).expect("build failed");
        assert_eq!(&args[..4], &["-y", "-ss", "00:00:05", "-i"]);
        assert!(!args.contains(&"-t".to_string()));

        job.duration = Some("10".to_string());
        let args = build_args(&job).expect("build failed");
        assert_eq!(&args[..6], &["-y", "-ss", "00:00:05", "-t", "10", "-i"]);
    }

    #[test]
    fn output_path_is_always_last() {
        for preset in ["h264", "h265", "mp3", "gif"] {
            let args = build_args(&preset_job(preset)).expect("build failed");
            assert_eq!(args.last().map(String::as_str), Some("/tmp/out.bin"));
        }
    }

    #[test]
    fn raw_mode_substitutes_placeholders_inside_tokens() {
        let job = JobSpec {
            mode: JobMode::Raw,
            raw_args: Some("-i file:{input} -f null {output}".to_string()),
            input_path: Some("/tmp/a.mov".to_string()),
            output_path: Some("/tmp/b.mp4".to_string()),
            ..Default::default()
        };

        let args = build_args(&job).expect("build failed");
        assert_eq!(args, vec!["-i", "file:/tmp/a.mov", "-f", "null", "/tmp/b.mp4"]);
    }

    #[test]
    fn raw_mode_requires_input_when_template_references_it() {
        let job = JobSpec {
            mode: JobMode::Raw,
            raw_args: Some("-i {input} -f null -".to_string()),
            ..Default::default()
        };

        let err = build_args(&job).expect_err("expected failure");
        assert!(err.to_string().contains("inputPath"));
    }

    #[test]
    fn raw_mode_requires_output_when_template_references_it() {
        let job = JobSpec {
            mode: JobMode::Raw,
            raw_args: Some("-i in.mp4 {output}".to_string()),
            ..Default::default()
        };

        let err = build_args(&job).expect_err("expected failure");
        assert!(err.to_string().contains("outputPath"));
    }

    #[test]
    fn raw_mode_requires_raw_args() {
        let job = JobSpec {
            mode: JobMode::Raw,
            raw_args: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(build_args(&job), Err(JobError::EmptyRawArgs));
    }

    #[test]
    fn raw_mode_injects_nothing() {
        let job = JobSpec {
            mode: JobMode::Raw,
            raw_args: Some("-version".to_string()),
            ..Default::default()
        };
        assert_eq!(build_args(&job).expect("build failed"), vec!["-version"]);
    }

    fn visual_job(preset: &str) -> JobSpec {
        JobSpec {
            mode: JobMode::Visual,
            preset: Some(preset.to_string()),
            input_path: Some("/tmp/a.mov".to_string()),
            output_path: Some("/tmp/b.mp4".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn visual_h265_override_case_matches_expected_order() {
        let job = JobSpec {
            crf: Some(26.0),
            speed_preset: Some("slow".to_string()),
            fps: Some(24.0),
            scale_width: Some(1280.0),
            pixel_format: Some("yuv420p".to_string()),
            movflags_faststart: Some(true),
            threads: Some(4.0),
            extra_args: Some(vec![ExtraArg {
                key: Some("-metadata".to_string()),
                value: Some("title=Sample Clip".to_string()),
                enabled: None,
            }]),
            ..visual_job("h265")
        };

        let args = build_args(&job).expect("build failed");
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/tmp/a.mov",
                "-c:v",
                "libx265",
                "-preset",
                "slow",
                "-crf",
                "26",
                "-c:a",
                "aac",
                "-b:a",
                "160k",
                "-vf",
                "fps=24,scale=1280:-1:flags=lanczos",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
                "-threads",
                "4",
                "-metadata",
                "title=Sample Clip",
                "/tmp/b.mp4",
            ]
        );
    }

    #[test]
    fn visual_defaults_fill_unset_fields() {
        let args = build_args(&visual_job("h264")).expect("build failed");
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/tmp/a.mov", "-c:v", "libx264", "-preset", "medium", "-crf",
                "23", "-c:a", "aac", "-b:a", "192k", "/tmp/b.mp4",
            ]
        );
    }

    #[test]
    fn visual_mp3_disables_video() {
        let args = build_args(&visual_job("mp3")).expect("build failed");
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/tmp/a.mov", "-vn", "-c:a", "libmp3lame", "-q:a", "2",
                "/tmp/b.mp4",
            ]
        );
    }

    #[test]
    fn visual_gif_disables_audio_and_loops() {
        let args = build_args(&visual_job("gif")).expect("build failed");
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/tmp/a.mov",
                "-an",
                "-vf",
                "fps=12,scale=480:-1:flags=lanczos",
                "-loop",
                "0",
                "/tmp/b.mp4",
            ]
        );
    }

    #[test]
    fn visual_overwrite_false_drops_dash_y() {
        let job = JobSpec {
            overwrite: Some(false),
            ..visual_job("h264")
        };
        let args = build_args(&job).expect("build failed");
        assert_ne!(args.first().map(String::as_str), Some("-y"));
    }

    #[test]
    fn visual_copy_codec_suppresses_preset_and_crf() {
        let job = JobSpec {
            video_codec: Some("copy".to_string()),
            ..visual_job("h264")
        };
        let args = build_args(&job).expect("build failed");
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(!args.contains(&"-preset".to_string()));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn visual_codec_none_disables_streams() {
        let job = JobSpec {
            video_codec: Some("none".to_string()),
            audio_codec: Some("none".to_string()),
            ..visual_job("h264")
        };
        let args = build_args(&job).expect("build failed");
        assert!(args.contains(&"-vn".to_string()));
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn visual_positive_integer_fields_round() {
        let job = JobSpec {
            sample_rate: Some(44100.4),
            channels: Some(2.6),
            threads: Some(0.0),
            ..visual_job("h264")
        };
        let args = build_args(&job).expect("build failed");
        assert!(args.windows(2).any(|w| w == ["-ar", "44100"]));
        assert!(args.windows(2).any(|w| w == ["-ac", "3"]));
        assert!(!args.contains(&"-threads".to_string()));
    }

    #[test]
    fn visual_scale_fills_missing_side_with_minus_one() {
        let job = JobSpec {
            scale_height: Some(720.0),
            ..visual_job("h264")
        };
        let args = build_args(&job).expect("build failed");
        assert!(args.windows(2).any(|w| w == ["-vf", "scale=-1:720:flags=lanczos"]));
    }

    #[test]
    fn visual_filter_chain_keeps_order() {
        let job = JobSpec {
            fps: Some(30.0),
            scale_width: Some(640.0),
            video_filter: Some("format=yuv420p".to_string()),
            ..visual_job("h264")
        };
        let args = build_args(&job).expect("build failed");
        assert!(args
            .windows(2)
            .any(|w| w == ["-vf", "fps=30,scale=640:-1:flags=lanczos,format=yuv420p"]));
    }

    #[test]
    fn visual_loop_zero_is_present_not_falsy() {
        let job = JobSpec {
            loop_value: Some("0".to_string()),
            ..visual_job("h264")
        };
        let args = build_args(&job).expect("build failed");
        assert!(args.windows(2).any(|w| w == ["-loop", "0"]));

        // Blank strings fall back to the preset default, which h264
        // does not define, so the flag disappears entirely.
        let job = JobSpec {
            loop_value: Some("   ".to_string()),
            ..visual_job("h264")
        };
        let args = build_args(&job).expect("build failed");
        assert!(!args.contains(&"-loop".to_string()));
    }

    #[test]
    fn visual_extra_args_normalize_and_filter() {
        let job = JobSpec {
            extra_args: Some(vec![
                ExtraArg {
                    key: Some("metadata".to_string()),
                    value: Some("title=x".to_string()),
                    enabled: None,
                },
                ExtraArg {
                    key: Some("-an".to_string()),
                    value: None,
                    enabled: None,
                },
                ExtraArg {
                    key: Some("-skipped".to_string()),
                    value: Some("yes".to_string()),
                    enabled: Some(false),
                },
                ExtraArg {
                    key: Some("  ".to_string()),
                    value: Some("orphan".to_string()),
                    enabled: Some(true),
                },
            ]),
            ..visual_job("h264")
        };

        let args = build_args(&job).expect("build failed");
        assert!(args.windows(2).any(|w| w == ["-metadata", "title=x"]));
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-skipped".to_string()));
        assert!(!args.contains(&"orphan".to_string()));
    }

    #[test]
    fn visual_unknown_preset_borrows_h264_defaults() {
        let args = build_args(&visual_job("mystery")).expect("build failed");
        assert!(args.contains(&"libx264".to_string()));
    }

    #[test]
    fn building_twice_is_idempotent() {
        let job = JobSpec {
            crf: Some(26.0),
            fps: Some(24.0),
            ..visual_job("h265")
        };
        let first = build_args(&job).expect("build failed");
        let second = build_args(&job).expect("build failed");
        assert_eq!(first, second);
    }
}
