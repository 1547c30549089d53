pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn long_version() -> String {
    format!("gnopls {VERSION}")
}
