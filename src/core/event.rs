use crate::core::progress::ProgressSample;

/// What the runner worker reports back over its channel, in arrival
/// order. Exactly one of `Completed`, `Stopped` or `Failed` ends the
/// stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    Log(String),
    Progress(ProgressSample),
    Completed,
    Stopped,
    Failed(String),
}
