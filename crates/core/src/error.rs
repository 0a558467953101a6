use thiserror::Error;

/// Failures resolving a start/end time-window pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("unable to parse {bound} timestamp '{value}': expected RFC 3339 or epoch seconds")]
    Unparseable { bound: &'static str, value: String },

    #[error("time window end '{end}' is before start '{start}'")]
    Inverted { start: String, end: String },
}
