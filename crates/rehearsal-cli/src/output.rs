//! Shared output layer for human/JSON parity across CLI commands.
//!
//! Every command handler receives an [`OutputMode`]. JSON output is one
//! pretty-printed document on stdout; errors go to stderr in the same mode.

use rehearsal_core::{Error, ErrorCode};
use serde::Serialize;
use std::io::{self, Write};

/// Shared width for human separators.
pub const RULE_WIDTH: usize = 56;

/// Write a section heading followed by a separator.
pub fn section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    writeln!(w, "{:-<width$}", "", width = RULE_WIDTH)
}

/// Render a left-aligned key/value line in human output.
pub fn kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub const fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Human }
    }
}

/// A structured error with optional hint and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
            error_code: None,
        }
    }

    /// Build from a coded core error, carrying its code and hint.
    pub fn from_core(err: &Error) -> Self {
        let code: ErrorCode = err.code();
        Self {
            message: err.to_string(),
            hint: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

/// Render a serializable value to stdout in the requested format.
///
/// In JSON mode the value is serialized with `serde_json`; in human mode the
/// `human_fn` closure writes the text.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Human => human_fn(value, &mut out)?,
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Human => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(hint) = &error.hint {
                writeln!(out, "  hint: {hint}")?;
            }
        }
    }
    Ok(())
}

/// An error that has already been written to stderr.
#[derive(Debug)]
pub struct Reported(pub String);

impl std::fmt::Display for Reported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Reported {}

/// Write `error` to stderr and return a failure `main` will not print again.
pub fn report(mode: OutputMode, error: &CliError) -> anyhow::Error {
    if let Err(render_err) = render_error(mode, error) {
        tracing::warn!(error = %render_err, "failed to render error");
    }
    anyhow::Error::new(Reported(error.message.clone()))
}

/// Report a core error on stderr and turn it into the command's failure.
pub fn fail(mode: OutputMode, err: &Error) -> anyhow::Error {
    report(mode, &CliError::from_core(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_selects_mode() {
        assert_eq!(OutputMode::from_json_flag(true), OutputMode::Json);
        assert_eq!(OutputMode::from_json_flag(false), OutputMode::Human);
    }

    #[test]
    fn core_error_carries_code_and_hint() {
        let err = Error::validation(ErrorCode::InvalidDate, "'2024-02-30' is not a date");
        let cli = CliError::from_core(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E1002"));
        assert!(cli.hint.is_some());

        let json = serde_json::to_value(&cli).expect("json");
        assert_eq!(json["message"], "'2024-02-30' is not a date");
    }

    #[test]
    fn plain_error_omits_optional_fields() {
        let json = serde_json::to_value(CliError::new("boom")).expect("json");
        assert_eq!(json, serde_json::json!({ "message": "boom" }));
    }

    #[test]
    fn failures_are_marked_as_reported() {
        let err = fail(
            OutputMode::Json,
            &Error::validation(ErrorCode::InvalidRequest, "bad input"),
        );
        let reported = err.downcast_ref::<Reported>().expect("marked");
        assert_eq!(reported.to_string(), "bad input");
    }

    #[test]
    fn helpers_write_aligned_lines() {
        let mut buf = Vec::new();
        section(&mut buf, "Pending").expect("section");
        kv(&mut buf, "date", "2024-6-10").expect("kv");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("Pending\n----"));
        assert!(text.contains("date:        2024-6-10"));
    }
}
