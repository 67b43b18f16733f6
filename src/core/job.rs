use serde::{Deserialize, Deserializer};

/// A single transcode job as handed over by the UI layer. Every field is
/// optional on the wire; the builder decides what is required per mode.
///
/// The camelCase field names are a compatibility contract with the
/// front end and must not change meaning field-by-field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSpec {
    pub mode: JobMode,
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub raw_args: Option<String>,
    pub preset: Option<String>,
    pub start_time: Option<String>,
    pub duration: Option<String>,
    pub overwrite: Option<bool>,
    pub crf: Option<f64>,
    pub speed_preset: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub pixel_format: Option<String>,
    pub video_bitrate: Option<String>,
    pub audio_bitrate: Option<String>,
    pub audio_quality: Option<String>,
    pub fps: Option<f64>,
    pub scale_width: Option<f64>,
    pub scale_height: Option<f64>,
    pub sample_rate: Option<f64>,
    pub channels: Option<f64>,
    pub threads: Option<f64>,
    pub format: Option<String>,
    #[serde(rename = "map")]
    pub map_spec: Option<String>,
    #[serde(rename = "loop")]
    pub loop_value: Option<String>,
    pub video_filter: Option<String>,
    pub movflags_faststart: Option<bool>,
    pub disable_video: Option<bool>,
    pub disable_audio: Option<bool>,
    pub extra_args: Option<Vec<ExtraArg>>,
}

/// Job dispatch mode. Absent or unrecognized values resolve to
/// `Preset`, which keeps old front ends working against newer cores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobMode {
    #[default]
    Preset,
    Visual,
    Raw,
}

impl JobMode {
    /// Anything that is not exactly `visual` or `raw` after trimming
    /// is a preset job.
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "visual" => JobMode::Visual,
            "raw" => JobMode::Raw,
            _ => JobMode::Preset,
        }
    }
}

impl<'de> Deserialize<'de> for JobMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(JobMode::parse(&String::deserialize(deserializer)?))
    }
}

/// Free-form `-key value` option appended after the structured visual
/// flags. Entries keep their input order; nothing is deduplicated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtraArg {
    pub key: Option<String>,
    pub value: Option<String>,
    pub enabled: Option<bool>,
}
