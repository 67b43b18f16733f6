use std::process::Command;

use serde::{Deserialize, Deserializer};

use crate::core::error::RunError;

/// Container-level facts about an input file, as reported by ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub file: String,
    pub format_name: String,
    pub duration_sec: Option<f64>,
    pub size_bytes: Option<f64>,
    pub bit_rate: Option<f64>,
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeStream {
    pub index: Option<u64>,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub sample_rate: Option<u64>,
    pub channels: Option<u64>,
    pub bit_rate: Option<f64>,
}

// ffprobe serializes numeric fields as strings or as JSON numbers
// depending on field and version; the raw shapes below accept either
// and silently drop values that parse to nothing (such as "N/A").
#[derive(Debug, Deserialize)]
struct RawProbe {
    format: Option<RawFormat>,
    #[serde(default)]
    streams: Vec<RawStream>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_name: Option<String>,
    #[serde(default, deserialize_with = "flex_f64")]
    duration: Option<f64>,
    #[serde(default, deserialize_with = "flex_f64")]
    size: Option<f64>,
    #[serde(default, deserialize_with = "flex_f64")]
    bit_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    #[serde(default, deserialize_with = "flex_u64")]
    index: Option<u64>,
    codec_type: Option<String>,
    codec_name: Option<String>,
    #[serde(default, deserialize_with = "flex_u64")]
    width: Option<u64>,
    #[serde(default, deserialize_with = "flex_u64")]
    height: Option<u64>,
    #[serde(default, deserialize_with = "flex_u64")]
    sample_rate: Option<u64>,
    #[serde(default, deserialize_with = "flex_u64")]
    channels: Option<u64>,
    #[serde(default, deserialize_with = "flex_f64")]
    bit_rate: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlexNumber {
    Number(f64),
    Text(String),
}

impl FlexNumber {
    fn as_f64(&self) -> Option<f64> {
        match self {
            FlexNumber::Number(value) => Some(*value),
            FlexNumber::Text(text) => text.trim().parse().ok(),
        }
        .filter(|value: &f64| value.is_finite())
    }
}

fn flex_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<FlexNumber>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(FlexNumber::as_f64))
}

fn flex_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = flex_f64(deserializer)?;
    Ok(value.filter(|v| *v >= 0.0).map(|v| v.round() as u64))
}

fn convert(raw: RawProbe, input_path: &str) -> ProbeInfo {
    let format = raw.format;

    let streams = raw
        .streams
        .into_iter()
        .map(|stream| ProbeStream {
            index: stream.index,
            codec_type: stream.codec_type,
            codec_name: stream.codec_name,
            width: stream.width,
            height: stream.height,
            sample_rate: stream.sample_rate,
            channels: stream.channels,
            bit_rate: stream.bit_rate,
        })
        .collect();

    ProbeInfo {
        file: input_path.to_string(),
        format_name: format
            .as_ref()
            .and_then(|f| f.format_name.clone())
            .unwrap_or_default(),
        duration_sec: format.as_ref().and_then(|f| f.duration),
        size_bytes: format.as_ref().and_then(|f| f.size),
        bit_rate: format.as_ref().and_then(|f| f.bit_rate),
        streams,
    }
}

fn parse_probe_output(stdout: &[u8], input_path: &str) -> Result<ProbeInfo, RunError> {
    let raw: RawProbe = serde_json::from_slice(stdout)?;
    Ok(convert(raw, input_path))
}

/// Runs ffprobe against an input file and decodes its JSON report.
pub fn probe_media(ffprobe_path: &str, input_path: &str) -> Result<ProbeInfo, RunError> {
    let output = Command::new(ffprobe_path)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            input_path,
        ])
        .output()
        .map_err(|err| RunError::spawn("ffprobe", err))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("exit code {}", output.status.code().unwrap_or(-1))
        } else {
            stderr
        };
        return Err(RunError::Tool {
            tool: "ffprobe",
            message,
        });
    }

    parse_probe_output(&output.stdout, input_path)
}
