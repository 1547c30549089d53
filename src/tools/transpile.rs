use std::io;
use std::path::Path;
use std::process::Command;

/// Transpile a Gno package: `gno transpile -skip-imports <dir>`.
/// Returns the combined stdout and stderr; compile-style errors land there.
pub fn transpile(dir: &Path) -> io::Result<Vec<u8>> {
    let output = Command::new("gno")
        .arg("transpile")
        .arg("-skip-imports")
        .arg(dir)
        .output()?;
    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    Ok(combined)
}
