use std::path::{Path, PathBuf};

use ard_shader_core::prelude::ContentHash;
use serde::{Deserialize, Serialize};

use crate::directive::{self, is_pragma_once, leading_ident};

/// Describes one header pulled into a shader stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeRecord {
    /// Resolved path of the header.
    #[serde(rename = "HeaderPath")]
    pub path: PathBuf,
    /// Distance from the root shader file. Headers included by the root file have a depth of 1.
    #[serde(rename = "IncludeDepth")]
    pub depth: u32,
    /// `true` if the header was found relative to the file that included it rather than through
    /// the search path.
    #[serde(rename = "IsRelative")]
    pub is_relative: bool,
    /// `true` if the header protects itself against being included more than once.
    #[serde(rename = "IsGuarded")]
    pub is_guarded: bool,
    /// Hash of the header's contents.
    #[serde(rename = "HashValue")]
    pub hash: ContentHash,
}

/// Resolves `#include` directives against an ordered list of search directories. The first
/// directory containing the requested file wins.
#[derive(Debug, Clone, Default)]
pub struct IncludeResolver {
    search_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInclude {
    pub path: PathBuf,
    pub is_relative: bool,
}

/// How the include was spelled in the source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IncludeKind {
    /// `#include "file"`. Looks next to the including file before using the search path.
    Quoted,
    /// `#include <file>`. Only uses the search path.
    Angled,
}

impl IncludeResolver {
    pub fn new(search_dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            search_dirs: search_dirs.into_iter().map(Into::into).collect(),
        }
    }

    #[inline(always)]
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Finds the file named by an include directive.
    ///
    /// `includer_dir` is the folder of the file containing the directive.
    pub fn resolve(
        &self,
        name: &str,
        kind: IncludeKind,
        includer_dir: Option<&Path>,
    ) -> Option<ResolvedInclude> {
        let requested = Path::new(name);
        if requested.is_absolute() {
            return requested.is_file().then(|| ResolvedInclude {
                path: normalize(requested.to_path_buf()),
                is_relative: false,
            });
        }

        if kind == IncludeKind::Quoted {
            if let Some(dir) = includer_dir {
                let candidate = dir.join(requested);
                if candidate.is_file() {
                    return Some(ResolvedInclude {
                        path: normalize(candidate),
                        is_relative: true,
                    });
                }
            }
        }

        self.search_dirs
            .iter()
            .map(|dir| dir.join(requested))
            .find(|candidate| candidate.is_file())
            .map(|candidate| ResolvedInclude {
                path: normalize(candidate),
                is_relative: false,
            })
    }
}

/// Splits the argument of an `#include` directive into the file name and how it was spelled.
pub fn parse_include_target(rest: &str) -> Option<(&str, IncludeKind)> {
    let rest = directive::strip_line_comment(rest).trim();
    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        return Some((&quoted[..end], IncludeKind::Quoted));
    }

    if let Some(angled) = rest.strip_prefix('<') {
        let end = angled.find('>')?;
        return Some((&angled[..end], IncludeKind::Angled));
    }

    None
}

/// Detects if a header protects itself against repeated inclusion, either through
/// `#pragma once` or by opening with the `#ifndef X` / `#define X` idiom.
pub fn is_include_guarded(text: &str) -> bool {
    let mut in_block_comment = false;
    let mut significant = text.lines().filter_map(|line| {
        let mut line = line.trim();
        if in_block_comment {
            match line.find("*/") {
                Some(end) => {
                    in_block_comment = false;
                    line = line[end + 2..].trim();
                }
                None => return None,
            }
        }
        if let Some(body) = line.strip_prefix("/*") {
            match body.find("*/") {
                Some(end) => line = body[end + 2..].trim(),
                None => {
                    in_block_comment = true;
                    return None;
                }
            }
        }
        let line = directive::strip_line_comment(line).trim();
        (!line.is_empty()).then_some(line)
    });

    let first = significant.next().and_then(directive::parse);
    let second = significant.next().and_then(directive::parse);

    if text
        .lines()
        .filter_map(directive::parse)
        .any(|directive| is_pragma_once(&directive))
    {
        return true;
    }

    match (first, second) {
        (Some(ifndef), Some(define)) if ifndef.name == "ifndef" && define.name == "define" => {
            let guard = leading_ident(ifndef.rest).map(|(name, _)| name);
            let defined = leading_ident(define.rest).map(|(name, _)| name);
            guard.is_some() && guard == defined
        }
        _ => false,
    }
}

fn normalize(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}
