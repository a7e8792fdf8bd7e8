//! Fuzzy path matching used by the Completer's `@`-mention helper (spec
//! §4.5/§9): given a fragment typed after `@`, rank candidate paths under a
//! base directory the same way a fuzzy file-finder would, respecting
//! `.gitignore`. This crate is deliberately small — a single-threaded walk
//! and a bounded best-matches heap — since it backs one optional completion
//! helper, not a standalone search tool.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;

use ignore::WalkBuilder;
use nucleo::Config;
use nucleo::Matcher;
use nucleo::Utf32Str;
use nucleo::pattern::AtomKind;
use nucleo::pattern::CaseMatching;
use nucleo::pattern::Normalization;
use nucleo::pattern::Pattern;

/// One fuzzy match: a path relative to the search root and its nucleo score
/// (higher is a better match).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub path: String,
    pub score: u32,
}

/// Rank files under `base_dir` against `fragment`, returning at most `limit`
/// matches sorted best-first (ties broken lexicographically for stability).
/// An empty fragment matches nothing — callers should show the bare
/// directory listing instead, not fall through here.
pub fn search_paths(base_dir: &Path, fragment: &str, limit: usize) -> Vec<PathMatch> {
    if fragment.is_empty() || limit == 0 {
        return Vec::new();
    }

    let pattern = Pattern::new(fragment, CaseMatching::Smart, Normalization::Smart, AtomKind::Fuzzy);
    let mut matcher = Matcher::new(Config::DEFAULT);
    let mut utf32buf = Vec::new();
    let mut heap: BinaryHeap<Reverse<(u32, String)>> = BinaryHeap::new();

    for entry in WalkBuilder::new(base_dir).build() {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_some_and(|ft| ft.is_dir()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(base_dir) else { continue };
        let Some(relative) = relative.to_str() else { continue };

        let haystack = Utf32Str::new(relative, &mut utf32buf);
        let Some(score) = pattern.score(haystack, &mut matcher) else { continue };

        if heap.len() < limit {
            heap.push(Reverse((score, relative.to_string())));
        } else if let Some(worst) = heap.peek() {
            if score > worst.0.0 {
                heap.pop();
                heap.push(Reverse((score, relative.to_string())));
            }
        }
    }

    let mut matches: Vec<PathMatch> = heap
        .into_iter()
        .map(|Reverse((score, path))| PathMatch { path, score })
        .collect();
    matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    matches
}
