use crate::lsp::packages::{Package, Symbol};
use dashmap::DashMap;
use std::sync::Arc;

/// Directory path to indexed-and-checked package. Written on open/save,
/// read on every query.
#[derive(Default)]
pub struct Cache {
    pkgs: DashMap<String, Arc<Package>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pkg_path: &str) -> Option<Arc<Package>> {
        self.pkgs.get(pkg_path).map(|entry| entry.value().clone())
    }

    pub fn set(&self, pkg_path: String, pkg: Package) {
        self.pkgs.insert(pkg_path, Arc::new(pkg));
    }

    pub fn lookup_symbol(&self, pkg_path: &str, symbol: &str) -> Option<Symbol> {
        let pkg = self.get(pkg_path)?;
        pkg.symbol(symbol).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::packages::{SourcePos, SymKind};
    use tower_lsp_server::lsp_types::Uri;

    fn pkg_with_symbol(name: &str) -> Package {
        let uri: Uri = "file:///tmp/demo/a.gno".parse().unwrap();
        Package {
            name: "demo".into(),
            import_path: "gno.land/r/demo".into(),
            symbols: vec![Symbol {
                name: name.into(),
                doc: String::new(),
                signature: format!("func {name}()"),
                kind: SymKind::Func,
                file: uri,
                pos: SourcePos { line: 1, col: 1 },
            }],
            ..Default::default()
        }
    }

    #[test]
    fn replaces_entries_atomically() {
        let cache = Cache::new();
        cache.set("/tmp/demo".into(), pkg_with_symbol("Old"));
        cache.set("/tmp/demo".into(), pkg_with_symbol("New"));
        assert!(cache.lookup_symbol("/tmp/demo", "Old").is_none());
        assert!(cache.lookup_symbol("/tmp/demo", "New").is_some());
    }

    #[test]
    fn miss_is_none() {
        let cache = Cache::new();
        assert!(cache.get("/absent").is_none());
    }
}
