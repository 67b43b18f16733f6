use std::path::Path;

fn extension_for_preset(preset: &str) -> &'static str {
    match preset {
        "mp3" => ".mp3",
        "gif" => ".gif",
        _ => ".mp4",
    }
}

/// Derives a default output path next to the input file, with the
/// extension the preset's container implies.
pub fn suggest_output_path(input_path: &str, preset: &str) -> String {
    if input_path.trim().is_empty() {
        return String::new();
    }

    let source = Path::new(input_path);
    let stem = source
        .file_stem()
        .and_then(|value| value.to_str())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or("output");

    let file_name = format!("{stem}_converted{}", extension_for_preset(preset));

    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(file_name).to_string_lossy().into_owned()
        }
        _ => file_name,
    }
}
