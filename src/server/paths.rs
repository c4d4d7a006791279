use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// A request URI mapped onto the served folder.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    /// Cleaned, rooted URL path, e.g. `/docs/a b.txt`.
    pub url_path: String,
    /// Location of that path on disk.
    pub fs_path: PathBuf,
}

/// Cleans `raw` like a rooted lexical `Clean`: percent-decodes it, drops
/// empty and `.` segments, and resolves `..` without ever leaving `/`.
///
/// Paths that do not decode to UTF-8 yield `None`.
pub fn clean_url_path(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    Some(format!("/{}", segments.join("/")))
}

pub fn resolve(root: &Path, raw: &str) -> Option<ResolvedPath> {
    let url_path = clean_url_path(raw)?;
    let fs_path = url_path
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment));

    Some(ResolvedPath { url_path, fs_path })
}

/// Base name of an uploaded file, or `None` when nothing usable remains.
pub fn upload_name(raw: &str) -> Option<String> {
    // browsers on windows may send full paths
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next()?.trim();

    match base {
        "" | "." | ".." => None,
        base => Some(base.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_segments() {
        assert_eq!(clean_url_path("").as_deref(), Some("/"));
        assert_eq!(clean_url_path("/").as_deref(), Some("/"));
        assert_eq!(clean_url_path("/docs//./notes/").as_deref(), Some("/docs/notes"));
        assert_eq!(clean_url_path("/a/b/../c").as_deref(), Some("/a/c"));
    }

    #[test]
    fn never_climbs_above_root() {
        assert_eq!(clean_url_path("/../../etc/passwd").as_deref(), Some("/etc/passwd"));
        assert_eq!(clean_url_path("/%2e%2e/%2E%2E/secret").as_deref(), Some("/secret"));
    }

    #[test]
    fn decodes_percent_escapes() {
        assert_eq!(
            clean_url_path("/my%20docs/r%C3%A9sum%C3%A9.pdf").as_deref(),
            Some("/my docs/résumé.pdf")
        );
    }

    #[test]
    fn rejects_paths_that_are_not_utf8() {
        assert_eq!(clean_url_path("/bad%FF.txt"), None);
        assert_eq!(resolve(Path::new("/srv/share"), "/%C3%28"), None);
    }

    #[test]
    fn resolves_under_root() {
        let root = Path::new("/srv/share");
        let resolved = resolve(root, "/docs/../pics/cat.png").unwrap();

        assert_eq!(resolved.url_path, "/pics/cat.png");
        assert_eq!(resolved.fs_path, root.join("pics").join("cat.png"));
        assert_eq!(resolve(root, "/").unwrap().fs_path, root.to_path_buf());
    }

    #[test]
    fn upload_names_are_base_names() {
        assert_eq!(upload_name("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(upload_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(upload_name("C:\\Users\\me\\photo.jpg").as_deref(), Some("photo.jpg"));
        assert_eq!(upload_name(".."), None);
        assert_eq!(upload_name("dir/"), None);
    }
}
