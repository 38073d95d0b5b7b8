//! Hierarchy path algebra.
//!
//! Paths are slash separated, root first, with no leading or trailing separator
//! (`Root/Body/Head`). Ancestry is decided on whole segments: `Root/Bo` is not an ancestor of
//! `Root/Body`.

pub const SEPARATOR: char = '/';

/// True iff `candidate` equals `ancestor` or lies beneath it.
pub fn is_descendant_or_self(candidate: &str, ancestor: &str) -> bool {
    match candidate.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// Segment-wise ordering. Every ancestor sorts before its descendants and the descendants of a
/// path are contiguous, which plain byte order does not guarantee (`"A (1)" < "A/B"`).
fn path_order(a: &str, b: &str) -> std::cmp::Ordering {
    a.split(SEPARATOR).cmp(b.split(SEPARATOR))
}

/// Reduce `paths` to its rootmost members: no returned path is a descendant-or-self of another.
///
/// Duplicates collapse. The result is sorted segment-wise.
pub fn highest_nodes<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<String> = paths.into_iter().map(|p| p.as_ref().to_string()).collect();
    sorted.sort_by(|a, b| path_order(a, b));

    let mut kept: Vec<String> = Vec::with_capacity(sorted.len());
    for path in sorted {
        match kept.last() {
            Some(last) if is_descendant_or_self(&path, last) => {}
            _ => kept.push(path),
        }
    }
    kept
}

/// A candidate covering a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorMatch<'a> {
    pub ancestor: &'a str,
    /// Remainder below the ancestor; `None` when the path is the ancestor itself
    pub relative: Option<String>,
}

/// Path of `descendant` relative to `ancestor`.
///
/// `None` if `descendant` is not a descendant-or-self; `Some(None)` if the two are equal.
pub fn relative_path(ancestor: &str, descendant: &str) -> Option<Option<String>> {
    let rest = descendant.strip_prefix(ancestor)?;
    if rest.is_empty() {
        return Some(None);
    }
    rest.strip_prefix(SEPARATOR)
        .map(|relative| Some(relative.to_string()))
}

/// First candidate that is an ancestor-or-self of `name`.
pub fn find_ancestor<'a, I, S>(candidates: I, name: &str) -> Option<AncestorMatch<'a>>
where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<str> + ?Sized + 'a,
{
    candidates.into_iter().find_map(|candidate| {
        let ancestor = candidate.as_ref();
        relative_path(ancestor, name).map(|relative| AncestorMatch { ancestor, relative })
    })
}

/// Everything before the last separator; `None` for a root path.
pub fn parent_of(path: &str) -> Option<&str> {
    path.rfind(SEPARATOR).map(|idx| &path[..idx])
}

/// Final segment of a path
pub fn leaf_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}
