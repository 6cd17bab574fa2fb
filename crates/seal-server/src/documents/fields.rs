//! Dot-notation field path traversal over JSON documents.

use serde_json::Value;

/// Segments of a dot-notation field path.
#[derive(Debug, PartialEq, Eq)]
enum PathSegment {
    /// Navigate into an object property by name.
    Key(String),
    /// Expand into every element of a JSON array.
    ArrayItem,
}

/// Parse a dot-notation path into a list of [`PathSegment`]s.
///
/// Array fields use the `[]` suffix before the dot separator, e.g.
/// `"orders[].card_number"` → `[Key("orders"), ArrayItem, Key("card_number")]`.
fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if let Some(key) = part.strip_suffix("[]") {
            segments.push(PathSegment::Key(key.to_owned()));
            segments.push(PathSegment::ArrayItem);
        } else {
            segments.push(PathSegment::Key(part.to_owned()));
        }
    }
    segments
}

/// Recursively navigate `value` following `segments` and hand every string
/// leaf found at the end of the path to `f`.
fn visit_at_path<E>(
    value: &mut Value,
    segments: &[PathSegment],
    f: &mut impl FnMut(&mut String) -> Result<(), E>,
) -> Result<usize, E> {
    let Some((head, rest)) = segments.split_first() else {
        return match value {
            Value::String(s) => f(s).map(|()| 1),
            _ => Ok(0),
        };
    };

    match head {
        PathSegment::Key(key) => match value {
            Value::Object(map) => match map.get_mut(key) {
                Some(child) => visit_at_path(child, rest, f),
                None => Ok(0),
            },
            _ => Ok(0),
        },
        PathSegment::ArrayItem => match value {
            Value::Array(arr) => {
                let mut visited = 0;
                for item in arr.iter_mut() {
                    visited += visit_at_path(item, rest, f)?;
                }
                Ok(visited)
            }
            _ => Ok(0),
        },
    }
}

/// Apply `f` to every string leaf reached by any of `paths`.
///
/// `f` receives the configured path (not the concrete array index) and the
/// leaf. Missing fields and non-string leaves are skipped. Returns the number
/// of leaves visited, or the first error `f` returns.
pub fn for_each_field<'p, E>(
    payload: &mut Value,
    paths: impl IntoIterator<Item = &'p String>,
    mut f: impl FnMut(&str, &mut String) -> Result<(), E>,
) -> Result<usize, E> {
    let mut visited = 0;
    for path in paths {
        let segments = parse_path(path);
        visited += visit_at_path(payload, &segments, &mut |leaf: &mut String| f(path.as_str(), leaf))?;
    }
    Ok(visited)
}
