use std::path::{Path, PathBuf, is_separator};

pub const MARKDOWN_EXT: &str = ".md";
pub const HTML_EXT: &str = ".html";

/// Returns true if the path's extension is `.md`, ignoring case.
pub fn is_markdown<P: AsRef<Path>>(path: P) -> bool {
    has_extension(path.as_ref(), MARKDOWN_EXT)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    match path.to_str() {
        Some(s) => extension_start(s)
            .map(|start| s[start..].eq_ignore_ascii_case(ext))
            .unwrap_or(false),
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| ext.strip_prefix('.').unwrap_or(ext).eq_ignore_ascii_case(e))
            .unwrap_or(false),
    }
}

/// Replaces the extension of `path` with `ext`, or appends `ext` when the
/// final segment has none. `ext` is a single extension such as `.html`.
pub fn set_extension<P: AsRef<Path>>(path: P, ext: &str) -> PathBuf {
    let path = path.as_ref();
    let ext = normalize_extension(ext);

    match path.to_str() {
        Some(s) => {
            let stem = match extension_start(s) {
                Some(start) => &s[..start],
                None => s,
            };
            PathBuf::from(format!("{stem}{ext}"))
        }
        // Not UTF-8, defer to std which splits on the same final dot.
        None => path.with_extension(ext.trim_start_matches('.')),
    }
}

fn normalize_extension(ext: &str) -> String {
    if ext.is_empty() || ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

// Byte offset of the last '.' in the final path segment.
fn extension_start(path: &str) -> Option<usize> {
    let segment = path.rfind(is_separator).map_or(0, |i| i + 1);
    path[segment..].rfind('.').map(|i| segment + i)
}
