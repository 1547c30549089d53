use std::io;
use std::path::Path;
use std::process::Command;

/// Build a Gno package: `gno build <dir>`.
/// Returns the combined stdout and stderr.
pub fn build(dir: &Path) -> io::Result<Vec<u8>> {
    let output = Command::new("gno").arg("build").arg(dir).output()?;
    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    Ok(combined)
}
