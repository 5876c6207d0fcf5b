//! `reloadr check`: parse a script and list its reloadable definitions.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use reloadr::log;
use reloadr::reload::Kind;
use reloadr::script::ast::Definition;
use reloadr::script::error::line_col;
use reloadr::script::{SyntaxError, parser};
use reloadr::utils::path::display_relative;

/// Decorators that wrap a definition in a reload proxy.
const RELOAD_DECORATORS: &[&str] = &["reloadr", "autoreload"];

/// One top-level definition found in the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionInfo {
    pub kind: Kind,
    pub name: String,
    pub line: usize,
    pub decorators: Vec<String>,
}

impl DefinitionInfo {
    pub fn is_reloadable(&self) -> bool {
        self.decorators
            .iter()
            .any(|d| RELOAD_DECORATORS.contains(&d.as_str()))
    }
}

/// Top-level definitions of `source`, in source order.
pub fn inspect(path: &Path, source: &str) -> Result<Vec<DefinitionInfo>, SyntaxError> {
    let program = parser::parse(path, source)?;
    let infos = program
        .definitions()
        .map(|def| DefinitionInfo {
            kind: match def {
                Definition::Fn(_) => Kind::Function,
                Definition::Class(_) => Kind::Class,
            },
            name: def.name().to_string(),
            line: line_col(source, def.def_span().start).0,
            decorators: def.decorators().iter().map(|d| d.name.clone()).collect(),
        })
        .collect();
    Ok(infos)
}

pub fn check_script(path: &Path) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("cannot read `{}`", path.display()))?;
    let infos = inspect(path, &source)?;
    let shown = display_relative(path);

    let reloadable: Vec<_> = infos.iter().filter(|i| i.is_reloadable()).collect();
    log!(
        "check";
        "{}: {} definition(s), {} reloadable",
        shown,
        infos.len(),
        reloadable.len()
    );
    for info in reloadable {
        let decorators: Vec<_> = info.decorators.iter().map(|d| format!("@{d}")).collect();
        println!(
            "  {} {} {} {}",
            format!("{shown}:{}", info.line).dimmed(),
            info.kind,
            info.name.bold(),
            decorators.join(" ").cyan()
        );
    }
    Ok(())
}
