use std::env;
use std::path::PathBuf;

/// Process configuration, built once in `main` and plumbed everywhere a
/// root path is needed.
#[derive(Clone, Debug, Default)]
pub struct Env {
    /// Root of the Gno tree; `examples/` and `gnovm/stdlibs/` live under it.
    pub gnoroot: String,
    /// Per-user state directory; scratch copies for diagnostics go here.
    pub gnohome: PathBuf,
}

impl Env {
    pub fn detect(gnoroot_flag: Option<String>) -> Self {
        let gnoroot = gnoroot_flag
            .or_else(|| env::var("GNOROOT").ok())
            .unwrap_or_default();
        Self {
            gnoroot,
            gnohome: gno_home(),
        }
    }
}

/// `GNO_HOME` if set, else `<user config dir>/gno`.
pub fn gno_home() -> PathBuf {
    if let Ok(dir) = env::var("GNO_HOME") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gno")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_overrides_environment() {
        let env = Env::detect(Some("/tmp/gnoroot".into()));
        assert_eq!(env.gnoroot, "/tmp/gnoroot");
    }

    #[test]
    fn gno_home_is_never_empty() {
        assert!(!gno_home().as_os_str().is_empty());
    }
}
