// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Include/exclude filtering of a repository manifest.
//!
//! Patterns follow `fnmatch` rules: `*`, `?`, `[...]` and `[!...]`, matched
//! against the whole relative path. Path separators are ordinary characters,
//! so `*.bin` matches `sub/dir/model.bin` and `**` is just two stars. An
//! unclosed `[` is a literal bracket. Matching is case-sensitive.
//!
//! Each pattern is translated to an anchored [`Regex`].

use regex::Regex;

use crate::error::{DownloadError, DownloadResult};
use crate::hub::RepoEntry;

/// One compiled shell pattern.
#[derive(Debug, Clone)]
struct ShellPattern {
    /// `None` when the pattern contains an empty character class.
    regex: Option<Regex>,
}

impl ShellPattern {
    fn compile(raw: &str) -> DownloadResult<Self> {
        let regex = match translate(raw) {
            Some(source) => Some(Regex::new(&source).map_err(|e| DownloadError::InvalidPattern {
                pattern: raw.to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        Ok(Self { regex })
    }

    fn matches(&self, filename: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(filename))
    }
}

/// Translate a shell pattern into regex source.
///
/// Returns `None` for a pattern that can never match.
fn translate(pattern: &str) -> Option<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from(r"\A(?s:");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                while chars.get(i) == Some(&'*') {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i..end])?);
                    i = end + 1;
                }
                None => out.push_str(r"\["),
            },
            other => push_escaped(&mut out, other),
        }
    }

    out.push_str(r")\z");
    Some(out)
}

/// Index of the `]` closing a class whose body starts at `start`.
///
/// A `]` right after `[` or `[!` belongs to the body.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    chars
        .get(j..)?
        .iter()
        .position(|&c| c == ']')
        .map(|offset| j + offset)
}

/// Translate a class body. Reversed ranges such as `z-a` match nothing and
/// are dropped; an empty positive class makes the pattern unmatchable.
fn translate_class(body: &[char]) -> Option<String> {
    let (negated, body) = match body.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, body),
    };

    let mut items = String::new();
    let mut k = 0;
    while k < body.len() {
        let lo = body[k];
        if body.get(k + 1) == Some(&'-') && k + 2 < body.len() {
            let hi = body[k + 2];
            if lo <= hi {
                push_escaped(&mut items, lo);
                items.push('-');
                push_escaped(&mut items, hi);
            }
            k += 3;
        } else {
            push_escaped(&mut items, lo);
            k += 1;
        }
    }

    match (negated, items.is_empty()) {
        (false, true) => None,
        (true, true) => Some(".".to_string()),
        (false, false) => Some(format!("[{}]", items)),
        (true, false) => Some(format!("[^{}]", items)),
    }
}

fn push_escaped(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Compiled include/exclude patterns.
///
/// An entry survives iff it matches at least one include pattern and no
/// exclude pattern. An empty include list matches everything.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    include: Vec<ShellPattern>,
    exclude: Vec<ShellPattern>,
}

impl FilterSpec {
    /// Compile patterns. An empty include list means `["*"]`.
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> DownloadResult<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Whether a single relative path passes the filter.
    pub fn matches(&self, filename: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(filename));
        included && !self.exclude.iter().any(|p| p.matches(filename))
    }

    /// Keep matching entries, preserving manifest order.
    pub fn apply(&self, entries: Vec<RepoEntry>) -> Vec<RepoEntry> {
        entries
            .into_iter()
            .filter(|entry| self.matches(&entry.filename))
            .collect()
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> DownloadResult<Vec<ShellPattern>> {
    patterns
        .iter()
        .map(|raw| ShellPattern::compile(raw.as_ref()))
        .collect()
}

/// Produce the final work set for a run.
///
/// With no filter the manifest passes through untouched. An empty result is
/// an [`DownloadError::EmptyWorkSet`] unless `skip_checks` is set.
pub fn select_work_set(
    repo_id: &str,
    entries: Vec<RepoEntry>,
    filter: Option<&FilterSpec>,
    skip_checks: bool,
) -> DownloadResult<Vec<RepoEntry>> {
    let total = entries.len();
    let selected = match filter {
        Some(spec) => spec.apply(entries),
        None => entries,
    };
    tracing::debug!(total, selected = selected.len(), "Filtered manifest");

    if !skip_checks && selected.is_empty() {
        return Err(DownloadError::EmptyWorkSet {
            repo_id: repo_id.to_string(),
        });
    }
    Ok(selected)
}
