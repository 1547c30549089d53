use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Which formatter binary handles `textDocument/formatting`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormattingOption {
    /// `gofmt`: canonical layout only.
    Plain,
    /// `gofumpt`: stricter superset of the plain rules.
    Strict,
}

impl FormattingOption {
    fn program(&self) -> &'static str {
        match self {
            FormattingOption::Plain => "gofmt",
            FormattingOption::Strict => "gofumpt",
        }
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to run {0}: {1}")]
    Spawn(&'static str, std::io::Error),
    #[error("{0} rejected the source: {1}")]
    Rejected(&'static str, String),
}

/// Format source bytes through the external formatter, stdin to stdout.
pub fn format(src: &[u8], opt: FormattingOption) -> Result<Vec<u8>, FormatError> {
    let program = opt.program();
    let mut child = Command::new(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| FormatError::Spawn(program, err))?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(src)
            .map_err(|err| FormatError::Spawn(program, err))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|err| FormatError::Spawn(program, err))?;
    if !output.status.success() {
        return Err(FormatError::Rejected(
            program,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output.stdout)
}
