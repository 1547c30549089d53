use crate::env::Env;
use crate::lsp::snapshot::GnoFile;
use crate::lsp::text::{pos_to_range, url_to_path};
use crate::tools;
use std::fs;
use std::io;
use std::path::Path;
use tower_lsp_server::lsp_types::{
    Diagnostic, DiagnosticSeverity, NumberOrString, Uri,
};
use tracing::info;

/// Generated Go files carry this many header lines; build-tool line
/// numbers are shifted back by it. Adjust here if the toolchain changes.
pub const GEN_HEADER_LINES: u32 = 4;

/// One structured error parsed from tool output or the type checker.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorInfo {
    pub file_name: String,
    pub line: u32,
    pub column: u32,
    /// 1-based `[start, end)` column span.
    pub span: (u32, u32),
    pub msg: String,
    pub tool: String,
}

/// Map a generated Go file name back to its gno source name.
pub fn go_to_gno_filename(fname: &str) -> &str {
    fname
        .strip_suffix(".gen_test.go")
        .or_else(|| fname.strip_suffix(".gen.go"))
        .unwrap_or(fname)
}

/// Drive the external tools for the package holding `file`: copy the
/// package to a scratch dir, transpile, and only if that is quiet, build.
pub fn transpile_and_build(env: &Env, file: &GnoFile) -> io::Result<Vec<ErrorInfo>> {
    let file_path = url_to_path(&file.uri)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "non-file URI"))?;
    let pkg_dir = file_path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file has no directory"))?;
    let pkg_name = pkg_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("pkg");
    let tmp_dir = env.gnohome.join("gnopls").join("tmp").join(pkg_name);

    copy_dir(pkg_dir, &tmp_dir)?;

    let transpile_out = tools::transpile(&tmp_dir).unwrap_or_default();
    info!("{}", String::from_utf8_lossy(&transpile_out));
    if !transpile_out.is_empty() {
        return Ok(parse_errors(
            file,
            &String::from_utf8_lossy(&transpile_out),
            "transpile",
        ));
    }

    let build_out = tools::build(&tmp_dir).unwrap_or_default();
    info!("{}", String::from_utf8_lossy(&build_out));
    Ok(parse_errors(
        file,
        &String::from_utf8_lossy(&build_out),
        "build",
    ))
}

/// Parse `name:line:col:msg` lines out of tool output. Lines that do not
/// match (headers, summaries, `# package` markers) are skipped.
pub fn parse_errors(file: &GnoFile, output: &str, tool: &str) -> Vec<ErrorInfo> {
    let mut errors = Vec::new();
    for line in output.lines() {
        let Some((fname, lineno, column, msg)) = parse_error_line(line) else {
            continue;
        };
        info!("parsing line={lineno} column={column} msg={msg}");
        errors.push(find_error(file, &fname, lineno, column, &msg, tool));
    }
    errors
}

/// The `^([^#]+?):(\d+):(\d+):(.+)$` match, expressed as a scan: the
/// shortest leading field followed by two numeric fields and a message.
fn parse_error_line(line: &str) -> Option<(String, u32, u32, String)> {
    let mut search_from = 0;
    while let Some(rel) = line[search_from..].find(':') {
        let idx = search_from + rel;
        let name = &line[..idx];
        if name.is_empty() || name.contains('#') {
            return None;
        }
        let rest = &line[idx + 1..];
        let mut parts = rest.splitn(3, ':');
        let lineno = parts.next().and_then(|s| s.trim().parse::<u32>().ok());
        let column = parts.next().and_then(|s| s.trim().parse::<u32>().ok());
        let msg = parts.next();
        if let (Some(lineno), Some(column), Some(msg)) = (lineno, column, msg) {
            if !msg.is_empty() {
                return Some((name.to_string(), lineno, column, msg.to_string()));
            }
        }
        search_from = idx + 1;
    }
    None
}

/// Aligns a tool error to the user's source: shifts generated-file line
/// numbers and re-anchors the span on an identifier from the message.
fn find_error(file: &GnoFile, fname: &str, line: u32, col: u32, msg: &str, tool: &str) -> ErrorInfo {
    let msg = msg.trim();
    let mut fname = fname;
    if tool == "transpile" {
        // Transpile output can glue extra context onto the file name.
        fname = fname.split(':').next().unwrap_or(fname);
    }

    // Error messages look like `<token> <error> (<info>)` or
    // `<error>: <token>`. Strip the parens and hunt for the tokens.
    let needle = strip_parenthesized(msg);
    let tokens: Vec<&str> = needle.split_whitespace().collect();

    let shifted_line = if tool == "build" {
        line.saturating_sub(GEN_HEADER_LINES)
    } else {
        line
    };

    let base = Path::new(fname)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(fname);
    let mut error_info = ErrorInfo {
        file_name: go_to_gno_filename(base).trim_start_matches('.').to_string(),
        line: shifted_line,
        column: col,
        span: (0, 0),
        msg: msg.to_string(),
        tool: tool.to_string(),
    };

    if let Some(src_line) = file.src.lines().nth(shifted_line.saturating_sub(1) as usize) {
        for token in &tokens {
            if contains_identifier(src_line, token) {
                error_info.span = (col, col + token.chars().count() as u32);
                return error_info;
            }
        }
    }

    // Token not found: fall back to a single-column span.
    error_info.span = (col, col + 1);
    error_info
}

fn strip_parenthesized(msg: &str) -> String {
    match (msg.find('('), msg.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let mut out = String::with_capacity(msg.len());
            out.push_str(&msg[..open]);
            out.push_str(&msg[close + 1..]);
            out
        }
        _ => msg.to_string(),
    }
}

/// Word-boundary identifier search, the `\b<token>\b` match.
fn contains_identifier(line: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(rel) = line[start..].find(token) {
        let idx = start + rel;
        let before_ok = idx == 0
            || !line[..idx]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
        let after = idx + token.len();
        let after_ok = after >= line.len()
            || !line[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if before_ok && after_ok {
            return true;
        }
        start = idx + token.len();
    }
    false
}

/// Diagnostics publication set for one file: its own errors, or an
/// explicit empty list so stale markers are cleared.
pub fn diagnostics_for_file(file: &GnoFile, errors: &[ErrorInfo]) -> (Uri, Vec<Diagnostic>) {
    let file_path = url_to_path(&file.uri)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();
    let diagnostics = errors
        .iter()
        .filter(|err| !err.file_name.is_empty() && file_path.ends_with(&err.file_name))
        .map(|err| Diagnostic {
            range: pos_to_range(err.line, err.span),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some("gnopls".into()),
            message: err.msg.clone(),
            code: Some(NumberOrString::String(err.tool.clone())),
            ..Default::default()
        })
        .collect();
    (file.uri.clone(), diagnostics)
}

/// Copy the content of `src` into `dst`, creating `dst` as needed.
/// Scratch copies are left behind on exit on purpose; they make failed
/// tool runs inspectable.
fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp_server::lsp_types::Uri;

    fn gno_file(src: &str) -> GnoFile {
        let uri: Uri = "file:///tmp/demo/a.gno".parse().unwrap();
        GnoFile::new(uri, src.to_string())
    }

    #[test]
    fn parses_compiler_style_lines() {
        let (name, line, col, msg) =
            parse_error_line("a.gno:4:2: undefined: strin").expect("match");
        assert_eq!(name, "a.gno");
        assert_eq!((line, col), (4, 2));
        assert_eq!(msg, " undefined: strin");
    }

    #[test]
    fn rejects_non_error_lines() {
        assert!(parse_error_line("# command-line-arguments").is_none());
        assert!(parse_error_line("command-line-arguments").is_none());
        assert!(parse_error_line("1 go build errors").is_none());
    }

    #[test]
    fn transpile_errors_keep_their_line() {
        let file = gno_file("package demo\n\nfunc f() {\n\tvar x strin\n\t_ = x\n}\n");
        let errors = parse_errors(&file, "a.gno:4:8: undefined: strin\n", "transpile");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 4);
        assert_eq!(errors[0].tool, "transpile");
        // `strin` sits on line 4; the span takes the token's rune width.
        assert_eq!(errors[0].span, (8, 13));
    }

    #[test]
    fn build_errors_shift_past_the_generated_header() {
        let file = gno_file("package demo\n\nfunc f() {\n\tvar x strin\n\t_ = x\n}\n");
        // The generated file adds four header lines, so line 8 is line 4.
        let errors = parse_errors(&file, "a.gno.gen.go:8:8: undefined: strin\n", "build");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 4);
        assert_eq!(errors[0].file_name, "a.gno");
        assert_eq!(errors[0].tool, "build");
    }

    #[test]
    fn missing_token_falls_back_to_single_column() {
        let file = gno_file("package demo\n");
        let errors = parse_errors(&file, "a.gno:1:3: something odd\n", "transpile");
        assert_eq!(errors[0].span, (3, 4));
    }

    #[test]
    fn parenthesized_qualifications_are_ignored() {
        let file = gno_file("package demo\n\nvar conflicting int\n");
        let errors = parse_errors(
            &file,
            "a.gno:3:5: conflicting redeclared (previous declaration at a.gno:1:1)\n",
            "transpile",
        );
        assert_eq!(errors[0].span.0, 5);
        assert!(errors[0].span.1 > 6);
    }

    #[test]
    fn clean_file_gets_empty_diagnostics() {
        let file = gno_file("package demo\n");
        let (uri, diags) = diagnostics_for_file(&file, &[]);
        assert_eq!(uri, file.uri);
        assert!(diags.is_empty());
    }

    #[test]
    fn diagnostics_carry_source_and_tool_code() {
        let file = gno_file("package demo\n\nfunc f() {\n\tvar x strin\n\t_ = x\n}\n");
        let errors = parse_errors(&file, "a.gno:4:8: undefined: strin\n", "transpile");
        let (_, diags) = diagnostics_for_file(&file, &errors);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].source.as_deref(), Some("gnopls"));
        assert_eq!(
            diags[0].code,
            Some(NumberOrString::String("transpile".into()))
        );
        assert_eq!(diags[0].range.start.line, 3);
    }

    #[test]
    fn generated_file_names_map_back() {
        assert_eq!(go_to_gno_filename("a.gno.gen.go"), "a.gno");
        assert_eq!(go_to_gno_filename("a.gno.gen_test.go"), "a.gno");
        assert_eq!(go_to_gno_filename("a.gno"), "a.gno");
    }
}
