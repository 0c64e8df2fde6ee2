//! Lossless prefix/suffix compression for file path lists.
//!
//! The downstream conversion function is invoked asynchronously with a
//! payload capped at 256 KB, so a batch's file paths are shipped as the
//! longest shared prefix, the longest shared suffix, and the per-path
//! residue in between. Landed feed files share long bucket prefixes and
//! `.json.gz` suffixes, which makes this cheap and effective.

use serde::{Deserialize, Serialize};

/// A set of file paths compressed into shared prefix, suffix and bodies.
///
/// For every `b` in `bodies`, `prefix + b + suffix` reconstructs one of the
/// original paths, in the original order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedPathSet {
    pub prefix: String,
    pub suffix: String,
    pub bodies: Vec<String>,
}

/// Compress a list of paths into a [`CompressedPathSet`].
///
/// Empty input yields the degenerate `{"", "", []}` set.
pub fn compress(paths: &[String]) -> CompressedPathSet {
    if paths.is_empty() {
        return CompressedPathSet::default();
    }

    let prefix = longest_common(paths, Affix::Prefix);
    let stripped: Vec<&str> = paths.iter().map(|p| &p[prefix.len()..]).collect();

    let suffix = longest_common(&stripped, Affix::Suffix);
    let bodies = stripped
        .iter()
        .map(|p| p[..p.len() - suffix.len()].to_string())
        .collect();

    CompressedPathSet {
        prefix,
        suffix,
        bodies,
    }
}

/// Reconstruct the original path list from a compressed set.
///
/// Exact left inverse of [`compress`] for any input.
pub fn decompress(set: &CompressedPathSet) -> Vec<String> {
    set.bodies
        .iter()
        .map(|body| format!("{}{}{}", set.prefix, body, set.suffix))
        .collect()
}

#[derive(Clone, Copy)]
enum Affix {
    Prefix,
    Suffix,
}

/// Longest string that every path starts (or ends) with.
///
/// Candidate lengths come from the first path; a candidate only survives if
/// it lands on a char boundary of every path and matches all of them.
fn longest_common<S: AsRef<str>>(paths: &[S], affix: Affix) -> String {
    let first = paths[0].as_ref();
    let mut result = "";

    for len in 1..=first.len() {
        let candidate = match affix {
            Affix::Prefix if first.is_char_boundary(len) => &first[..len],
            Affix::Suffix if first.is_char_boundary(first.len() - len) => &first[first.len() - len..],
            _ => continue,
        };

        let all_match = paths.iter().all(|p| match affix {
            Affix::Prefix => p.as_ref().starts_with(candidate),
            Affix::Suffix => p.as_ref().ends_with(candidate),
        });

        if !all_match {
            break;
        }
        result = candidate;
    }

    result.to_string()
}
