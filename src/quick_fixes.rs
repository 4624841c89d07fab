//! Deterministic fixes for a small set of common, mechanical errors, applied
//! without going back to the model.
//!
//! Grounded exactly on the Python predecessor's quick-fixes module: the
//! ordered matcher list, the package-alias table, the lockfile-priority
//! package-manager detection, and the fix-descriptor/application semantics
//! (`find_quick_fix`/`apply_quick_fix`).

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixType {
    InstallPackage,
    AddImport,
    FixSyntax,
    FixIndentation,
}

/// A fix descriptor: install-package carries a shell `command`; the three
/// content-edit kinds carry either an insert (`insert_line`/`insert_content`)
/// or a replace (`old_content`/`new_content`) against `file_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickFix {
    pub fix_type: FixType,
    pub description: String,
    pub command: Option<String>,
    pub file_path: Option<String>,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub insert_line: Option<usize>,
    pub insert_content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Uv,
    Pip,
    Pipenv,
    Poetry,
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManager {
    fn install_command(&self, package: &str) -> String {
        match self {
            PackageManager::Uv => format!("uv add {package}"),
            PackageManager::Pip => format!("pip install {package}"),
            PackageManager::Pipenv => format!("pipenv install {package}"),
            PackageManager::Poetry => format!("poetry add {package}"),
            PackageManager::Npm => format!("npm install {package}"),
            PackageManager::Yarn => format!("yarn add {package}"),
            PackageManager::Pnpm => format!("pnpm add {package}"),
        }
    }
}

/// Detects the repo's package manager by lockfile priority: uv.lock or a
/// `[tool.uv]` section in pyproject.toml, then requirements.txt, Pipfile,
/// poetry.lock, package-lock.json, yarn.lock, pnpm-lock.yaml, else pip.
pub fn detect_package_manager(repo_path: &Path) -> PackageManager {
    if repo_path.join("uv.lock").exists() {
        return PackageManager::Uv;
    }
    if let Ok(contents) = std::fs::read_to_string(repo_path.join("pyproject.toml")) {
        if contents.contains("[tool.uv]") {
            return PackageManager::Uv;
        }
    }
    if repo_path.join("requirements.txt").exists() {
        return PackageManager::Pip;
    }
    if repo_path.join("Pipfile").exists() {
        return PackageManager::Pipenv;
    }
    if repo_path.join("poetry.lock").exists() {
        return PackageManager::Poetry;
    }
    if repo_path.join("package-lock.json").exists() {
        return PackageManager::Npm;
    }
    if repo_path.join("yarn.lock").exists() {
        return PackageManager::Yarn;
    }
    if repo_path.join("pnpm-lock.yaml").exists() {
        return PackageManager::Pnpm;
    }
    PackageManager::Pip
}

const STDLIB_MODULES: &[&str] = &[
    "os", "sys", "re", "json", "math", "random", "datetime", "collections", "itertools",
    "functools", "typing", "pathlib", "subprocess", "shutil", "logging", "unittest", "io",
    "time", "copy", "abc", "enum", "dataclasses", "asyncio", "threading", "multiprocessing",
];

/// Maps an import name to its installable package name where they differ.
fn package_alias(module: &str) -> &str {
    match module {
        "yaml" => "pyyaml",
        "cv2" => "opencv-python",
        "PIL" => "pillow",
        "sklearn" => "scikit-learn",
        "bs4" => "beautifulsoup4",
        "dotenv" => "python-dotenv",
        "jwt" => "pyjwt",
        other => other,
    }
}

/// Name → one-line import statement, for names that cause a `NameError` when
/// the agent forgets the corresponding import.
const COMMON_IMPORTS: &[(&str, &str)] = &[
    ("Optional", "from typing import Optional"),
    ("List", "from typing import List"),
    ("Dict", "from typing import Dict"),
    ("Any", "from typing import Any"),
    ("Union", "from typing import Union"),
    ("Callable", "from typing import Callable"),
    ("TypeVar", "from typing import TypeVar"),
    ("dataclass", "from dataclasses import dataclass"),
    ("field", "from dataclasses import field"),
    ("Enum", "from enum import Enum"),
    ("Path", "from pathlib import Path"),
    ("datetime", "from datetime import datetime"),
    ("timedelta", "from datetime import timedelta"),
    ("timezone", "from datetime import timezone"),
    ("json", "import json"),
    ("re", "import re"),
    ("os", "import os"),
    ("sys", "import sys"),
];

fn first_module_token(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
        .find(|s| !s.is_empty())
        .map(|s| s.split('.').next().unwrap_or(s).to_string())
}

static MODULE_NOT_FOUND_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)no module named ['"]([^'"]+)['"]"#).unwrap());

static CANNOT_IMPORT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)cannot import name ['"]([^'"]+)['"] from ['"]([^'"]+)['"]"#).unwrap()
});

static NAME_NOT_DEFINED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)name ['"]([^'"]+)['"] is not defined"#).unwrap());

static PYTHON_TRACEBACK_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"File "([^"]+)", line (\d+)"#).unwrap());

static DIAGNOSTIC_LINE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([^\s:][^:\n]*):(\d+):\d+:").unwrap());

static DEF_KEYWORD_NO_COLON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(def|class|if|elif|else|for|while|try|except|finally|with)\b.*[^:\s]\s*$").unwrap()
});

/// Extracts the file and 1-based line number an error refers to, preferring
/// the deepest Python traceback frame (closest to the actual failure), then
/// falling back to a ruff/eslint-style `path:line:col:` diagnostic.
fn extract_file_and_line(text: &str) -> Option<(String, usize)> {
    if let Some(cap) = PYTHON_TRACEBACK_FRAME.captures_iter(text).last() {
        let line: usize = cap[2].parse().ok()?;
        return Some((cap[1].to_string(), line));
    }
    if let Some(cap) = DIAGNOSTIC_LINE_PATTERN.captures(text) {
        let line: usize = cap[2].parse().ok()?;
        return Some((cap[1].to_string(), line));
    }
    None
}

/// Reads the workspace-relative file named in `file_path` (if it resolves
/// safely inside `repo_path`), returning its lines.
fn read_lines(repo_path: &Path, file_path: &str) -> Option<Vec<String>> {
    let resolved = crate::safety::safe_resolve(file_path, repo_path).ok()?;
    let content = std::fs::read_to_string(resolved).ok()?;
    Some(content.lines().map(|l| l.to_string()).collect())
}

/// Finds, within `line`, a quoted string literal containing `{...}` whose
/// prefix has neither `f` nor `b`, and returns `(old_literal, new_literal)`
/// with an `f` prefix added. Written without regex backreferences since the
/// `regex` crate doesn't support them.
fn fstring_fix(line: &str) -> Option<(String, String)> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < line.len() {
        let c = bytes[i] as char;
        if c == '"' || c == '\'' {
            let quote = c;
            let mut start = i;
            while start > 0 && (bytes[start - 1] as char).is_ascii_alphabetic() {
                start -= 1;
            }
            let prefix = &line[start..i];
            if let Some(rel_end) = line[i + 1..].find(quote) {
                let end = i + 1 + rel_end;
                let body = &line[i + 1..end];
                if body.contains('{') && body.contains('}') {
                    let lower_prefix = prefix.to_lowercase();
                    if !lower_prefix.contains('f') && !lower_prefix.contains('b') {
                        let old_literal = line[start..=end].to_string();
                        let new_literal = format!("f{prefix}{quote}{body}{quote}");
                        return Some((old_literal, new_literal));
                    }
                }
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    None
}

/// Attempts to find a quick fix for `error_summary`. Returns `None` when no
/// known pattern matches. Matchers run in the order the Python predecessor
/// applies them: module-not-found, cannot-import-name, name-not-defined,
/// missing colon, missing f-prefix, indentation.
pub fn find_quick_fix(error_summary: &str, repo_path: &Path) -> Option<QuickFix> {
    let file_and_line = extract_file_and_line(error_summary);
    let file_path = file_and_line.as_ref().map(|(f, _)| f.clone());

    // 1. ModuleNotFoundError / ImportError: No module named 'x'
    if let Some(cap) = MODULE_NOT_FOUND_PATTERN.captures(error_summary) {
        if let Some(module) = first_module_token(&cap[1]) {
            if !STDLIB_MODULES.contains(&module.as_str()) {
                let package = package_alias(&module);
                let manager = detect_package_manager(repo_path);
                return Some(QuickFix {
                    fix_type: FixType::InstallPackage,
                    description: format!("Install missing package '{package}'"),
                    command: Some(manager.install_command(package)),
                    file_path: None,
                    old_content: None,
                    new_content: None,
                    insert_line: None,
                    insert_content: None,
                });
            }
        }
    }

    // 2. ImportError: cannot import name 'X' from 'Y'
    if let Some(cap) = CANNOT_IMPORT_PATTERN.captures(error_summary) {
        let name = &cap[1];
        let module = &cap[2];
        return Some(QuickFix {
            fix_type: FixType::AddImport,
            description: format!("Add import: from {module} import {name}"),
            command: None,
            file_path,
            old_content: None,
            new_content: None,
            insert_line: Some(1),
            insert_content: Some(format!("from {module} import {name}\n")),
        });
    }

    // 3. NameError: name 'X' is not defined
    if let Some(cap) = NAME_NOT_DEFINED_PATTERN.captures(error_summary) {
        let name = &cap[1];
        if let Some((_, import_line)) = COMMON_IMPORTS.iter().find(|(n, _)| *n == name) {
            return Some(QuickFix {
                fix_type: FixType::AddImport,
                description: format!("Add missing import for '{name}'"),
                command: None,
                file_path,
                old_content: None,
                new_content: None,
                insert_line: Some(1),
                insert_content: Some(format!("{import_line}\n")),
            });
        }
    }

    // Matchers 4-6 need the actual erroring line's content.
    let (file, line_num) = file_and_line?;
    let lines = read_lines(repo_path, &file)?;
    if line_num == 0 || line_num > lines.len() {
        return None;
    }
    let current_line = &lines[line_num - 1];

    // 4. SyntaxError: expected ':'
    if (error_summary.to_lowercase().contains("expected ':'")
        || error_summary.to_lowercase().contains("invalid syntax"))
        && DEF_KEYWORD_NO_COLON.is_match(current_line)
    {
        return Some(QuickFix {
            fix_type: FixType::FixSyntax,
            description: format!("Add missing colon at line {line_num} in {file}"),
            command: None,
            file_path: Some(file),
            old_content: Some(current_line.clone()),
            new_content: Some(format!("{}:", current_line.trim_end())),
            insert_line: None,
            insert_content: None,
        });
    }

    // 5. SyntaxError: f-string missing prefix (f"...")
    if let Some((old_literal, new_literal)) = fstring_fix(current_line) {
        let new_line = current_line.replacen(&old_literal, &new_literal, 1);
        if new_line != *current_line {
            return Some(QuickFix {
                fix_type: FixType::FixSyntax,
                description: format!("Add missing f-string prefix at line {line_num} in {file}"),
                command: None,
                file_path: Some(file),
                old_content: Some(current_line.clone()),
                new_content: Some(new_line),
                insert_line: None,
                insert_content: None,
            });
        }
    }

    // 6. IndentationError
    let lower = error_summary.to_lowercase();
    if lower.contains("indentationerror") || lower.contains("indentation") {
        let leading_len = current_line.len() - current_line.trim_start().len();
        let leading = &current_line[..leading_len];
        if leading.contains('\t') && leading.contains(' ') {
            let new_leading = leading.replace('\t', "    ");
            let new_line = format!("{new_leading}{}", current_line.trim_start());
            return Some(QuickFix {
                fix_type: FixType::FixIndentation,
                description: format!("Fix mixed indentation at line {line_num} in {file}"),
                command: None,
                file_path: Some(file),
                old_content: Some(current_line.clone()),
                new_content: Some(new_line),
                insert_line: None,
                insert_content: None,
            });
        }
        if lower.contains("unexpected indent") && line_num > 1 {
            let prev_line = &lines[line_num - 2];
            let prev_indent = prev_line.len() - prev_line.trim_start().len();
            let expected_indent = if prev_line.trim_end().ends_with(':') {
                prev_indent + 4
            } else {
                prev_indent
            };
            let new_line = format!("{}{}", " ".repeat(expected_indent), current_line.trim_start());
            return Some(QuickFix {
                fix_type: FixType::FixIndentation,
                description: format!("Fix unexpected indentation at line {line_num} in {file}"),
                command: None,
                file_path: Some(file),
                old_content: Some(current_line.clone()),
                new_content: Some(new_line),
                insert_line: None,
                insert_content: None,
            });
        }
    }

    None
}

/// Applies `fix` to the repository and returns whether it succeeded.
/// `InstallPackage` fixes are executed as a subprocess by the caller (the
/// ReAct loop routes them through `run_command`); this function applies only
/// the three in-file edit kinds, validating the target path stays inside the
/// workspace (the path-safety rule, same as every other tool).
pub fn apply_quick_fix(fix: &QuickFix, repo_path: &Path) -> bool {
    match fix.fix_type {
        FixType::InstallPackage => false,
        FixType::AddImport | FixType::FixSyntax | FixType::FixIndentation => {
            apply_file_edit(fix, repo_path)
        }
    }
}

fn apply_file_edit(fix: &QuickFix, repo_path: &Path) -> bool {
    let Some(file_path) = &fix.file_path else {
        return false;
    };
    let Ok(resolved) = crate::safety::safe_resolve(file_path, repo_path) else {
        return false;
    };
    let Ok(content) = std::fs::read_to_string(&resolved) else {
        return false;
    };

    let new_content = if let (Some(old), Some(new)) = (&fix.old_content, &fix.new_content) {
        if !content.contains(old.as_str()) {
            return false;
        }
        content.replacen(old.as_str(), new.as_str(), 1)
    } else if let (Some(line), Some(insert)) = (fix.insert_line, &fix.insert_content) {
        let mut lines: Vec<&str> = content.lines().collect();
        let idx = line.saturating_sub(1).min(lines.len());
        let insert_text = insert.trim_end_matches('\n').to_string();
        lines.insert(idx, &insert_text);
        let mut joined = lines.join("\n");
        if content.ends_with('\n') {
            joined.push('\n');
        }
        joined
    } else {
        return false;
    };

    std::fs::write(&resolved, new_content).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detect_package_manager_prefers_uv_lock() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("uv.lock"), "").unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "").unwrap();
        assert_eq!(detect_package_manager(dir.path()), PackageManager::Uv);
    }

    #[test]
    fn test_detect_package_manager_falls_back_to_pip() {
        let dir = tempdir().unwrap();
        assert_eq!(detect_package_manager(dir.path()), PackageManager::Pip);
    }

    #[test]
    fn test_find_quick_fix_module_not_found_translates_alias() {
        let dir = tempdir().unwrap();
        let fix = find_quick_fix("ModuleNotFoundError: No module named 'yaml'", dir.path())
            .expect("expected a fix");
        assert_eq!(fix.fix_type, FixType::InstallPackage);
        assert!(fix.command.unwrap().contains("pyyaml"));
    }

    #[test]
    fn test_find_quick_fix_skips_stdlib_modules() {
        let dir = tempdir().unwrap();
        let fix = find_quick_fix("ModuleNotFoundError: No module named 'os'", dir.path());
        assert!(fix.is_none());
    }

    #[test]
    fn test_find_quick_fix_cannot_import_name_emits_add_import() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();
        let error = format!(
            "File \"{}\", line 1\nImportError: cannot import name 'foo' from 'bar'",
            dir.path().join("app.py").display()
        );
        let fix = find_quick_fix(&error, dir.path()).expect("expected a fix");
        assert_eq!(fix.fix_type, FixType::AddImport);
        assert_eq!(fix.insert_content.as_deref(), Some("from bar import foo\n"));
    }

    #[test]
    fn test_find_quick_fix_name_not_defined_known_import() {
        let dir = tempdir().unwrap();
        let fix = find_quick_fix("NameError: name 'Path' is not defined", dir.path())
            .expect("expected a fix");
        assert_eq!(fix.fix_type, FixType::AddImport);
        assert_eq!(fix.insert_content.as_deref(), Some("from pathlib import Path\n"));
    }

    #[test]
    fn test_find_quick_fix_name_not_defined_unknown_name_returns_none() {
        let dir = tempdir().unwrap();
        let fix = find_quick_fix("NameError: name 'frobnicator' is not defined", dir.path());
        assert!(fix.is_none());
    }

    #[test]
    fn test_find_quick_fix_missing_colon() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "def add(a, b)\n    return a + b\n").unwrap();
        let error = format!("File \"{}\", line 1\nSyntaxError: invalid syntax", file.display());
        let fix = find_quick_fix(&error, dir.path()).expect("expected a fix");
        assert_eq!(fix.fix_type, FixType::FixSyntax);
        assert_eq!(fix.new_content.as_deref(), Some("def add(a, b):"));
    }

    #[test]
    fn test_find_quick_fix_missing_fstring_prefix() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "print(\"value is {x}\")\n").unwrap();
        let error = format!("File \"{}\", line 1\nSyntaxError: invalid syntax", file.display());
        let fix = find_quick_fix(&error, dir.path()).expect("expected a fix");
        assert_eq!(fix.fix_type, FixType::FixSyntax);
        assert_eq!(fix.new_content.as_deref(), Some("print(f\"value is {x}\")"));
    }

    #[test]
    fn test_find_quick_fix_indentation_mixed_tabs_and_spaces() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "def f():\n\t return 1\n").unwrap();
        let error = format!(
            "File \"{}\", line 2\nIndentationError: inconsistent use of tabs and spaces",
            file.display()
        );
        let fix = find_quick_fix(&error, dir.path()).expect("expected a fix");
        assert_eq!(fix.fix_type, FixType::FixIndentation);
        assert_eq!(fix.new_content.as_deref(), Some("     return 1"));
    }

    #[test]
    fn test_find_quick_fix_indentation_unexpected_indent_after_colon() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "if True:\n        return 1\n").unwrap();
        let error = format!("File \"{}\", line 2\nIndentationError: unexpected indent", file.display());
        let fix = find_quick_fix(&error, dir.path()).expect("expected a fix");
        assert_eq!(fix.fix_type, FixType::FixIndentation);
        assert_eq!(fix.new_content.as_deref(), Some("    return 1"));
    }

    #[test]
    fn test_find_quick_fix_no_match_returns_none() {
        let dir = tempdir().unwrap();
        assert!(find_quick_fix("all tests passed", dir.path()).is_none());
    }

    #[test]
    fn test_apply_quick_fix_add_import_writes_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "x = Path('.')\n").unwrap();
        let fix = QuickFix {
            fix_type: FixType::AddImport,
            description: "Add missing import for 'Path'".to_string(),
            command: None,
            file_path: Some("app.py".to_string()),
            old_content: None,
            new_content: None,
            insert_line: Some(1),
            insert_content: Some("from pathlib import Path\n".to_string()),
        };
        assert!(apply_quick_fix(&fix, dir.path()));
        let content = std::fs::read_to_string(&file).unwrap();
        assert_eq!(content, "from pathlib import Path\nx = Path('.')\n");
    }

    #[test]
    fn test_apply_quick_fix_fix_syntax_replaces_exact_line() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "def add(a, b)\n    return a + b\n").unwrap();
        let fix = QuickFix {
            fix_type: FixType::FixSyntax,
            description: "Add missing colon".to_string(),
            command: None,
            file_path: Some("app.py".to_string()),
            old_content: Some("def add(a, b)".to_string()),
            new_content: Some("def add(a, b):".to_string()),
            insert_line: None,
            insert_content: None,
        };
        assert!(apply_quick_fix(&fix, dir.path()));
        let content = std::fs::read_to_string(&file).unwrap();
        assert!(content.starts_with("def add(a, b):\n"));
    }

    #[test]
    fn test_apply_quick_fix_rejects_path_escaping_workspace() {
        let dir = tempdir().unwrap();
        let fix = QuickFix {
            fix_type: FixType::FixSyntax,
            description: "Add missing colon".to_string(),
            command: None,
            file_path: Some("../outside.py".to_string()),
            old_content: Some("x".to_string()),
            new_content: Some("y".to_string()),
            insert_line: None,
            insert_content: None,
        };
        assert!(!apply_quick_fix(&fix, dir.path()));
    }

    #[test]
    fn test_apply_quick_fix_fails_when_old_content_missing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "def add(a, b):\n    return a + b\n").unwrap();
        let fix = QuickFix {
            fix_type: FixType::FixSyntax,
            description: "Add missing colon".to_string(),
            command: None,
            file_path: Some("app.py".to_string()),
            old_content: Some("def add(a, b)".to_string()),
            new_content: Some("def add(a, b):".to_string()),
            insert_line: None,
            insert_content: None,
        };
        assert!(!apply_quick_fix(&fix, dir.path()));
    }

    #[test]
    fn test_install_package_fix_is_never_applied_directly() {
        let fix = QuickFix {
            fix_type: FixType::InstallPackage,
            description: "Install missing package 'pyyaml'".to_string(),
            command: Some("pip install pyyaml".to_string()),
            file_path: None,
            old_content: None,
            new_content: None,
            insert_line: None,
            insert_content: None,
        };
        let dir = tempdir().unwrap();
        assert!(!apply_quick_fix(&fix, dir.path()));
    }
}
