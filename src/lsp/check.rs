use crate::env::Env;
use crate::lang::{
    check::{check_package, CheckedSource, ImportError, Importer, PackageScope, TypeError, TypeInfo},
    parser::parse_file,
    span::LineIndex,
};
use crate::lsp::diagnostics::ErrorInfo;
use crate::lsp::packages::list_gno_files;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageInfoError {
    #[error("GNOROOT not set")]
    NoRoot,
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Clone, Debug)]
pub struct FileInfo {
    pub name: String,
    pub body: String,
}

#[derive(Clone, Debug)]
pub struct PackageInfo {
    pub dir: PathBuf,
    pub import_path: String,
    pub files: Vec<FileInfo>,
}

/// Loads the sources of a package named by absolute path or import path.
/// Import paths under the dialect domain resolve below `examples/`, the
/// rest below `gnovm/stdlibs/`.
pub fn get_package_info(path: &str, env: &Env) -> Result<PackageInfo, PackageInfoError> {
    let dir = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        if env.gnoroot.is_empty() {
            // Without GNOROOT neither `examples` nor `stdlibs` can be found.
            return Err(PackageInfoError::NoRoot);
        }
        if path.starts_with("gno.land/") {
            Path::new(&env.gnoroot).join("examples").join(path)
        } else {
            Path::new(&env.gnoroot)
                .join("gnovm")
                .join("stdlibs")
                .join(path)
        }
    };

    let files = list_gno_files(&dir).map_err(|source| PackageInfoError::Io {
        path: dir.clone(),
        source,
    })?;
    let mut infos = Vec::new();
    for file in files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if name.ends_with("_test.gno") || name.ends_with("_filetest.gno") {
            continue;
        }
        let body = fs::read_to_string(&file).map_err(|source| PackageInfoError::Io {
            path: file.clone(),
            source,
        })?;
        infos.push(FileInfo { name, body });
    }
    // Fallback mirrors the indexer: the short directory name for absolute
    // paths, the import path itself otherwise, so the two stay comparable.
    let import_path = crate::lsp::packages::module_import_path(&dir).unwrap_or_else(|| {
        if Path::new(path).is_absolute() {
            dir.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(path)
                .to_string()
        } else {
            path.to_string()
        }
    });
    Ok(PackageInfo {
        dir,
        import_path,
        files: infos,
    })
}

/// The outcome of checking one package: checked sources, the expression
/// info map, the package's own scope, and every accumulated error.
#[derive(Debug)]
pub struct TypeCheckResult {
    pub import_path: String,
    pub files: Vec<CheckedSource>,
    pub info: TypeInfo,
    pub scope: Arc<PackageScope>,
    pub errors: Vec<TypeError>,
}

impl TypeCheckResult {
    /// Accumulated diagnostics in the shape the publication pipeline
    /// speaks: file, line, column, span, message, tool tag.
    pub fn errors(&self) -> Vec<ErrorInfo> {
        self.errors
            .iter()
            .map(|err| ErrorInfo {
                file_name: err.file.clone(),
                line: err.line,
                column: err.col,
                span: (err.col, u32::MAX),
                msg: err.message.clone(),
                tool: "typecheck".to_string(),
            })
            .collect()
    }

    fn failed(import_path: &str, errors: Vec<TypeError>) -> Self {
        Self {
            import_path: import_path.to_string(),
            files: Vec::new(),
            info: TypeInfo::default(),
            scope: Arc::new(PackageScope::default()),
            errors,
        }
    }
}

enum CacheEntry {
    /// Currently being checked further up the import stack.
    InProgress,
    Done(Arc<TypeCheckResult>),
}

/// The type-check engine. Also the importer: dependencies are loaded and
/// checked recursively, with every outcome memoised by import path — hits,
/// misses, and cycles alike.
pub struct TypeCheck {
    env: Env,
    cache: RefCell<HashMap<String, CacheEntry>>,
}

impl TypeCheck {
    pub fn new(env: Env) -> Self {
        Self {
            env,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Check the sources of `info` as one package.
    pub fn check(&self, info: &PackageInfo) -> Arc<TypeCheckResult> {
        // Mark the package under check so an import chain looping back to
        // it is caught instead of recursing forever.
        self.cache
            .borrow_mut()
            .insert(info.import_path.clone(), CacheEntry::InProgress);
        let mut errors: Vec<TypeError> = Vec::new();
        let mut sources = Vec::new();
        for file in &info.files {
            match parse_file(&file.body) {
                Ok(parsed) => {
                    let index = LineIndex::new(&file.body);
                    for err in &parsed.errors {
                        let line = index.line(err.span.start);
                        let col_start = index.line_start(line).unwrap_or(0);
                        errors.push(TypeError {
                            file: file.name.clone(),
                            line,
                            col: err.span.start.saturating_sub(col_start) as u32 + 1,
                            message: err.message.clone(),
                        });
                    }
                    sources.push(CheckedSource::new(&file.name, &file.body, parsed.file));
                }
                Err(parse_errors) => {
                    let index = LineIndex::new(&file.body);
                    for err in parse_errors.errors {
                        let line = index.line(err.span.start);
                        let col_start = index.line_start(line).unwrap_or(0);
                        errors.push(TypeError {
                            file: file.name.clone(),
                            line,
                            col: err.span.start.saturating_sub(col_start) as u32 + 1,
                            message: err.message,
                        });
                    }
                }
            }
        }
        let outcome = check_package(&info.import_path, &sources, self);
        errors.extend(outcome.errors);
        let result = Arc::new(TypeCheckResult {
            import_path: info.import_path.clone(),
            files: sources,
            info: outcome.info,
            scope: outcome.scope,
            errors,
        });
        self.cache
            .borrow_mut()
            .insert(info.import_path.clone(), CacheEntry::Done(result.clone()));
        result
    }

    fn import_result(&self, path: &str) -> Result<Arc<TypeCheckResult>, ImportError> {
        {
            let cache = self.cache.borrow();
            match cache.get(path) {
                Some(CacheEntry::Done(result)) => return Ok(result.clone()),
                Some(CacheEntry::InProgress) => {
                    return Err(ImportError::Cycle(path.to_string()));
                }
                None => {}
            }
        }
        self.cache
            .borrow_mut()
            .insert(path.to_string(), CacheEntry::InProgress);

        let result = match get_package_info(path, &self.env) {
            Ok(info) => self.check(&info),
            Err(err) => {
                // Cache the miss too, so repeated lookups stay cheap.
                let result = Arc::new(TypeCheckResult::failed(
                    path,
                    vec![TypeError {
                        file: String::new(),
                        line: 1,
                        col: 1,
                        message: err.to_string(),
                    }],
                ));
                self.cache
                    .borrow_mut()
                    .insert(path.to_string(), CacheEntry::Done(result));
                return Err(ImportError::NotFound(path.to_string()));
            }
        };
        self.cache
            .borrow_mut()
            .insert(path.to_string(), CacheEntry::Done(result.clone()));
        Ok(result)
    }
}

impl Importer for TypeCheck {
    fn import(&self, path: &str) -> Result<Arc<PackageScope>, ImportError> {
        let result = self.import_result(path)?;
        Ok(result.scope.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn env_with_root(root: &Path) -> Env {
        Env {
            gnoroot: root.to_string_lossy().to_string(),
            gnohome: root.join("home"),
        }
    }

    fn write_examples_pkg(root: &Path, import_path: &str, body: &str) {
        let dir = root.join("examples").join(import_path);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("pkg.gno"), body).unwrap();
        fs::write(dir.join("gno.mod"), format!("module {import_path}\n")).unwrap();
    }

    #[test]
    fn domain_paths_resolve_under_examples() {
        let root = tempdir().expect("tempdir");
        write_examples_pkg(
            root.path(),
            "gno.land/p/demo/greet",
            "package greet\n\n// Hello greets.\nfunc Hello() string { return \"hi\" }\n",
        );
        let env = env_with_root(root.path());
        let info = get_package_info("gno.land/p/demo/greet", &env).expect("info");
        assert_eq!(info.files.len(), 1);
        assert_eq!(info.import_path, "gno.land/p/demo/greet");
    }

    #[test]
    fn missing_root_is_an_error_for_import_paths() {
        let env = Env::default();
        assert!(matches!(
            get_package_info("gno.land/p/demo/greet", &env),
            Err(PackageInfoError::NoRoot)
        ));
    }

    #[test]
    fn importer_memoises_failures() {
        let root = tempdir().expect("tempdir");
        let env = env_with_root(root.path());
        let tc = TypeCheck::new(env);
        assert!(tc.import("gno.land/p/missing").is_err());
        // Second lookup hits the cached failure.
        assert!(tc.import("gno.land/p/missing").is_err());
        assert!(matches!(
            tc.cache.borrow().get("gno.land/p/missing"),
            Some(CacheEntry::Done(_))
        ));
    }

    #[test]
    fn import_cycles_are_typed_errors() {
        let root = tempdir().expect("tempdir");
        write_examples_pkg(
            root.path(),
            "gno.land/p/demo/a",
            "package a\n\nimport \"gno.land/p/demo/b\"\n\nfunc A() { b.B() }\n",
        );
        write_examples_pkg(
            root.path(),
            "gno.land/p/demo/b",
            "package b\n\nimport \"gno.land/p/demo/a\"\n\nfunc B() { a.A() }\n",
        );
        let env = env_with_root(root.path());
        let tc = TypeCheck::new(env.clone());
        let info = get_package_info("gno.land/p/demo/a", &env).expect("info");
        let _ = tc.check(&info);
        // The loop is broken at b's import of a; b carries the diagnostic.
        let cache = tc.cache.borrow();
        let Some(CacheEntry::Done(b)) = cache.get("gno.land/p/demo/b") else {
            panic!("b not checked");
        };
        assert!(b.errors.iter().any(|err| err.message.contains("cycle")));
    }

    #[test]
    fn check_accumulates_typecheck_errors() {
        let root = tempdir().expect("tempdir");
        write_examples_pkg(
            root.path(),
            "gno.land/p/demo/bad",
            "package bad\n\nfunc f() {\n\t_ = missing\n}\n",
        );
        let env = env_with_root(root.path());
        let tc = TypeCheck::new(env.clone());
        let info = get_package_info("gno.land/p/demo/bad", &env).expect("info");
        let result = tc.check(&info);
        assert_eq!(result.errors.len(), result.errors().len());
        let infos = result.errors();
        assert_eq!(infos[0].tool, "typecheck");
        assert_eq!(infos[0].line, 4);
    }
}
