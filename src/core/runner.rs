use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::core::builder::build_args;
use crate::core::error::RunError;
use crate::core::event::RunnerEvent;
use crate::core::job::JobSpec;
use crate::core::probe::probe_media;
use crate::core::progress::{parse_progress, parse_time, ProgressSample};

// At most one transcode may be in flight in the whole process. The
// guard lives here so the pure core stays stateless and reentrant.
static ACTIVE_TASK: Lazy<Mutex<Option<TaskSlot>>> = Lazy::new(|| Mutex::new(None));

// The slot is claimed before any fallible start-up work (argument
// building, duration probing, spawning), so two overlapping starts
// cannot both pass the occupancy check and both spawn.
enum TaskSlot {
    Claimed,
    Running(RunningTask),
}

#[derive(Clone)]
struct RunningTask {
    child: Arc<Mutex<Child>>,
    cancelled: Arc<AtomicBool>,
}

fn claim_slot() -> Result<(), RunError> {
    let mut guard = ACTIVE_TASK.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_some() {
        return Err(RunError::Busy);
    }
    *guard = Some(TaskSlot::Claimed);
    Ok(())
}

fn release_claim() {
    let mut guard = ACTIVE_TASK.lock().unwrap_or_else(PoisonError::into_inner);
    if matches!(guard.as_ref(), Some(TaskSlot::Claimed)) {
        *guard = None;
    }
}

fn is_explicit_path(path: &str) -> bool {
    path.contains('/') || path.contains('\\') || path.starts_with('.')
}

/// Resolves the executable to invoke for a tool. Explicit paths pass
/// through untouched; bare names prefer the usual Homebrew and
/// /usr/local install locations when they exist.
pub fn resolve_executable(configured: Option<&str>, tool: &'static str) -> String {
    let configured = configured
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(tool)
        .to_string();

    if is_explicit_path(&configured) {
        return configured;
    }

    let candidates: [&str; 2] = match tool {
        "ffprobe" => ["/opt/homebrew/bin/ffprobe", "/usr/local/bin/ffprobe"],
        _ => ["/opt/homebrew/bin/ffmpeg", "/usr/local/bin/ffmpeg"],
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return candidate.to_string();
        }
    }

    configured
}

/// A total duration for ratio computation: the job's own duration field
/// when it parses to something positive, else whatever ffprobe reports
/// for the input. `None` downgrades progress to time-only samples.
fn resolve_duration(job: &JobSpec) -> Option<f64> {
    if let Some(duration) = job.duration.as_deref().and_then(parse_time) {
        if duration > 0.0 {
            return Some(duration);
        }
    }

    let input = job.input_path.as_deref().map(str::trim).unwrap_or("");
    if input.is_empty() {
        return None;
    }

    let ffprobe = resolve_executable(job.ffprobe_path.as_deref(), "ffprobe");
    probe_media(&ffprobe, input)
        .ok()
        .and_then(|info| info.duration_sec)
}

fn read_stream_lines<R: Read>(reader: R, mut on_line: impl FnMut(&str)) {
    let mut reader = BufReader::new(reader);
    let mut line_buf: Vec<u8> = Vec::new();
    let mut byte = [0u8; 1];

    // Byte-wise: ffmpeg separates progress updates with bare '\r'.
    loop {
        match reader.read(&mut byte) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        match byte[0] {
            b'\r' | b'\n' => {
                if !line_buf.is_empty() {
                    let line = String::from_utf8_lossy(&line_buf).to_string();
                    line_buf.clear();
                    if !line.trim().is_empty() {
                        on_line(&line);
                    }
                }
            }
            other => line_buf.push(other),
        }
    }

    if !line_buf.is_empty() {
        let line = String::from_utf8_lossy(&line_buf).to_string();
        if !line.trim().is_empty() {
            on_line(&line);
        }
    }
}

fn wait_for_exit(child_ref: &Arc<Mutex<Child>>) -> Result<ExitStatus, String> {
    loop {
        let status = {
            let mut child = child_ref
                .lock()
                .map_err(|_| "child process lock poisoned".to_string())?;
            child.try_wait().map_err(|err| err.to_string())?
        };

        if let Some(status) = status {
            return Ok(status);
        }

        thread::sleep(Duration::from_millis(120));
    }
}

fn clear_active_task(target: &Arc<Mutex<Child>>) {
    let mut guard = ACTIVE_TASK.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(TaskSlot::Running(current)) = guard.as_ref() {
        if Arc::ptr_eq(&current.child, target) {
            *guard = None;
        }
    }
}

/// Starts a transcode and returns the event stream for it. Fails with
/// `RunError::Busy` while another transcode is still in flight.
pub fn start(job: &JobSpec) -> Result<Receiver<RunnerEvent>, RunError> {
    claim_slot()?;
    start_claimed(job).map_err(|err| {
        release_claim();
        err
    })
}

fn start_claimed(job: &JobSpec) -> Result<Receiver<RunnerEvent>, RunError> {
    let args = build_args(job)?;
    let ffmpeg = resolve_executable(job.ffmpeg_path.as_deref(), "ffmpeg");
    let duration_sec = resolve_duration(job);

    let mut child = Command::new(&ffmpeg)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| RunError::spawn("ffmpeg", err))?;

    let stderr = child.stderr.take().ok_or(RunError::Tool {
        tool: "ffmpeg",
        message: "failed to capture stderr".to_string(),
    })?;

    let child_ref = Arc::new(Mutex::new(child));
    let cancelled = Arc::new(AtomicBool::new(false));

    {
        let mut guard = ACTIVE_TASK.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(TaskSlot::Running(RunningTask {
            child: child_ref.clone(),
            cancelled: cancelled.clone(),
        }));
    }

    let (event_tx, event_rx) = mpsc::channel::<RunnerEvent>();

    thread::spawn(move || {
        read_stream_lines(stderr, |line| {
            let _ = event_tx.send(RunnerEvent::Log(line.to_string()));
            if let Some(sample) = parse_progress(line, duration_sec) {
                let _ = event_tx.send(RunnerEvent::Progress(sample));
            }
        });

        match wait_for_exit(&child_ref) {
            Ok(status) => {
                if cancelled.load(Ordering::SeqCst) {
                    let _ = event_tx.send(RunnerEvent::Stopped);
                } else if status.success() {
                    if let Some(total) = duration_sec {
                        let _ = event_tx.send(RunnerEvent::Progress(ProgressSample {
                            current_time_sec: total,
                            ratio: Some(1.0),
                        }));
                    }
                    let _ = event_tx.send(RunnerEvent::Completed);
                } else {
                    let code = status
                        .code()
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    let _ = event_tx.send(RunnerEvent::Failed(format!(
                        "ffmpeg exited with code {code}"
                    )));
                }
            }
            Err(message) => {
                let _ = event_tx.send(RunnerEvent::Failed(message));
            }
        }

        clear_active_task(&child_ref);
    });

    Ok(event_rx)
}

/// Cancels the in-flight transcode, if any. Returns whether there was
/// one to stop; the runner thread reports `Stopped` once it exits.
pub fn stop() -> bool {
    let running = {
        let guard = ACTIVE_TASK.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(TaskSlot::Running(task)) => Some(task.clone()),
            _ => None,
        }
    };

    let Some(task) = running else {
        return false;
    };

    task.cancelled.store(true, Ordering::SeqCst);

    if let Ok(mut child) = task.child.lock() {
        let _ = child.kill();
    }

    true
}
