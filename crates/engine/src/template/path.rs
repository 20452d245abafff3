//! Parses `$json`-style reference paths (`a.b[2].c`, `close[-1]`,
//! `a["weird key"]`) into a sequence of [`PathSegment`]s, and walks them
//! against a [`serde_json::Value`].

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(i64),
}

/// Parse a dot/bracket path into segments. Does not itself look anything
/// up — see [`get_path`].
#[must_use]
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut chars = path.chars();
    let mut current = String::new();

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let mut inner = String::new();
                for c2 in chars.by_ref() {
                    if c2 == ']' {
                        break;
                    }
                    inner.push(c2);
                }
                push_bracket_segment(inner.trim(), &mut segments);
            }
            other => current.push(other),
        }
    }
    flush(&mut current, &mut segments);
    segments
}

fn flush(current: &mut String, segments: &mut Vec<PathSegment>) {
    if !current.is_empty() {
        segments.push(PathSegment::Key(std::mem::take(current)));
    }
}

fn push_bracket_segment(inner: &str, segments: &mut Vec<PathSegment>) {
    if inner.is_empty() {
        return;
    }
    let quoted = (inner.starts_with('"') && inner.ends_with('"') && inner.len() >= 2)
        || (inner.starts_with('\'') && inner.ends_with('\'') && inner.len() >= 2);
    if quoted {
        segments.push(PathSegment::Key(inner[1..inner.len() - 1].to_string()));
    } else if let Ok(idx) = inner.parse::<i64>() {
        segments.push(PathSegment::Index(idx));
    } else {
        segments.push(PathSegment::Key(inner.to_string()));
    }
}

/// Walk `value` following `segments`. Negative indices count from the end
/// of the array (`-1` is the last element). Returns `None` if any segment
/// doesn't resolve — callers leave the original template literal in place
/// when that happens (spec §4.2).
#[must_use]
pub fn get_path(value: &Value, segments: &[PathSegment]) -> Option<Value> {
    let mut current = value;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
            (PathSegment::Index(i), Value::Array(arr)) => {
                let len = arr.len() as i64;
                let idx = if *i < 0 { len + i } else { *i };
                if idx < 0 || idx >= len {
                    return None;
                }
                &arr[idx as usize]
            }
            _ => return None,
        };
    }
    Some(current.clone())
}
