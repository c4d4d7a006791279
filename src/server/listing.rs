use std::{fmt::Write, path::Path};

use askama_escape::{escape, Html};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::fs;

use crate::error::ServerResult;
use crate::models::{EntryInfo, FolderListing};

/// Drag-and-drop uploader embedded in every listing page.
pub const UPLOAD_SCRIPT: &str = include_str!("../../assets/upload.js");

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}\
td,th{padding:.2em 1em;text-align:left}\
td.size{text-align:right}\
.hint{color:#777}";

pub fn fmt_bytes(b: u64) -> String {
    const KILO: u64 = 1 << 10;
    const MEGA: u64 = 1 << 20;
    const GIGA: u64 = 1 << 30;

    match b {
        b if b >= GIGA => format!("{:.1}G", b as f64 / GIGA as f64),
        b if b >= MEGA => format!("{:.1}M", b as f64 / MEGA as f64),
        b if b >= KILO => format!("{:.1}K", b as f64 / KILO as f64),
        b => b.to_string(),
    }
}

/// Same layout as the Unix `date` command.
pub fn fmt_time(t: &DateTime<Utc>) -> String {
    t.format("%a %b %e %H:%M:%S %Z %Y").to_string()
}

/// Directories first, then by name.
pub fn sort_entries(entries: &mut [EntryInfo]) {
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
}

pub async fn read_folder(url_path: &str, folder: &Path) -> ServerResult<FolderListing> {
    let mut dir = fs::read_dir(folder).await?;
    let mut entries = Vec::new();

    while let Some(entry) = dir.next_entry().await? {
        let meta = entry.metadata().await?;
        entries.push(EntryInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: meta.is_dir(),
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        });
    }
    sort_entries(&mut entries);

    Ok(FolderListing {
        path: url_path.to_string(),
        entries,
    })
}

fn href(folder: &str, name: &str, is_dir: bool) -> String {
    let joined = if folder.ends_with('/') {
        format!("{}{}", folder, name)
    } else {
        format!("{}/{}", folder, name)
    };
    let mut href = utf8_percent_encode(&joined, PATH_SEGMENT).to_string();
    if is_dir {
        href.push('/');
    }
    href
}

fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) | None => Some("/"),
        Some(i) => Some(&path[..i]),
    }
}

pub fn render_folder(listing: &FolderListing) -> String {
    let title = escape(&listing.path, Html).to_string();
    let mut rows = String::new();

    if let Some(parent) = parent(&listing.path) {
        let link = utf8_percent_encode(parent, PATH_SEGMENT).to_string();
        let _ = writeln!(
            rows,
            "<tr><td><a href=\"{}\">../</a></td><td></td><td></td></tr>",
            link
        );
    }

    for entry in &listing.entries {
        let size = if entry.is_dir {
            "-".to_string()
        } else {
            fmt_bytes(entry.size)
        };
        let modified = entry.modified.as_ref().map(fmt_time).unwrap_or_default();
        let _ = writeln!(
            rows,
            "<tr><td><a href=\"{}\">{}</a></td><td class=\"size\">{}</td><td>{}</td></tr>",
            href(&listing.path, &entry.name, entry.is_dir),
            escape(&entry.display_name(), Html),
            size,
            modified,
        );
    }

    format!(
        "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<title>{title}</title>\n\
<style>{style}</style>\n\
</head>\n\
<body>\n\
<h1>{title}</h1>\n\
<table>\n\
<tr><th>Name</th><th>Size</th><th>Modified</th></tr>\n\
{rows}</table>\n\
<p class=\"hint\">Drop files anywhere on this page to upload them here.</p>\n\
<script>\n{script}</script>\n\
</body>\n\
</html>\n",
        title = title,
        style = STYLE,
        rows = rows,
        script = UPLOAD_SCRIPT,
    )
}
