//! `srcset` candidate lists.

/// Applies `map` to the URL of every candidate, keeping descriptors verbatim.
/// Candidates are rejoined with `, `; empty candidates are dropped.
pub(crate) fn recast(srcset: &str, map: impl Fn(&str) -> String) -> String {
    if srcset.trim().is_empty() {
        return srcset.to_string();
    }
    srcset
        .split(',')
        .filter_map(|candidate| {
            let candidate = candidate.trim();
            let mut parts = candidate.split_whitespace();
            let url = parts.next()?;
            let mut out = map(url);
            for descriptor in parts {
                out.push(' ');
                out.push_str(descriptor);
            }
            Some(out)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
