use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    body::{boxed, Body},
    extract::{multipart::Field, Extension, Multipart, Query},
    http::{Request, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use tokio::{fs, io::AsyncWriteExt};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::{listing, paths};
use crate::error::{respond_with_status, ServerError, ServerResult};
use crate::models::ListingQuery;

const INDEX_FILENAMES: [&str; 2] = ["index.html", "index.htm"];

/// The folder being shared.
#[derive(Debug, Clone)]
pub struct Site {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Replace,
}

pub fn generate_filename() -> String {
    let mut rng = thread_rng();

    (0..10)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect::<String>()
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn serve_file(path: &Path, req: Request<Body>) -> ServerResult<Response> {
    let res = ServeFile::new(path).oneshot(req).await?;
    Ok(res.map(boxed))
}

/// GET: a file, a folder's index page, or a folder listing.
pub async fn get_path(
    Extension(site): Extension<Arc<Site>>,
    Query(query): Query<ListingQuery>,
    req: Request<Body>,
) -> ServerResult<Response> {
    let resolved = paths::resolve(&site.root, req.uri().path())
        .ok_or_else(|| ServerError::NotFound(req.uri().path().to_string()))?;

    let meta = match fs::metadata(&resolved.fs_path).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ServerError::NotFound(resolved.url_path))
        }
        Err(err) => return Err(err.into()),
    };

    if !meta.is_dir() {
        return serve_file(&resolved.fs_path, req).await;
    }

    for name in INDEX_FILENAMES {
        let index = resolved.fs_path.join(name);
        if is_file(&index).await {
            return serve_file(&index, req).await;
        }
    }

    let listing = listing::read_folder(&resolved.url_path, &resolved.fs_path).await?;
    if query.wants_json() {
        Ok(Json(listing).into_response())
    } else {
        Ok(Html(listing::render_folder(&listing)).into_response())
    }
}

/// POST: store uploads, refusing names that already exist.
pub async fn create_upload(
    Extension(site): Extension<Arc<Site>>,
    uri: Uri,
    multipart: Multipart,
) -> ServerResult<Response> {
    store_uploads(&site, &uri, multipart, WriteMode::Create).await
}

/// PUT: store uploads, overwriting existing files.
pub async fn replace_upload(
    Extension(site): Extension<Arc<Site>>,
    uri: Uri,
    multipart: Multipart,
) -> ServerResult<Response> {
    store_uploads(&site, &uri, multipart, WriteMode::Replace).await
}

async fn store_uploads(
    site: &Site,
    uri: &Uri,
    mut multipart: Multipart,
    mode: WriteMode,
) -> ServerResult<Response> {
    let resolved = paths::resolve(&site.root, uri.path())
        .ok_or_else(|| ServerError::NotFound(uri.path().to_string()))?;
    if !is_dir(&resolved.fs_path).await {
        return Err(ServerError::NotFound(resolved.url_path));
    }

    while let Some(field) = multipart.next_field().await? {
        // plain form values carry no file
        let filename = match field.file_name() {
            Some(raw) => paths::upload_name(raw).unwrap_or_else(generate_filename),
            None => continue,
        };
        let target = resolved.fs_path.join(&filename);

        tracing::info!("\tuploading {:?} to {:?}", filename, resolved.url_path);
        write_field(field, &target, &filename, mode).await?;
    }

    Ok(respond_with_status(StatusCode::OK))
}

async fn write_field(
    mut field: Field<'_>,
    target: &Path,
    filename: &str,
    mode: WriteMode,
) -> ServerResult<()> {
    let mut file = match mode {
        WriteMode::Create => {
            match fs::OpenOptions::new().write(true).create_new(true).open(target).await {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!("\t{:?} already exists!", filename);
                    return Err(ServerError::Conflict(filename.to_string()));
                }
                Err(err) => return Err(err.into()),
            }
        }
        WriteMode::Replace => fs::File::create(target).await?,
    };

    let written: ServerResult<()> = async {
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if written.is_err() {
        drop(file);
        if let Err(err) = fs::remove_file(target).await {
            tracing::warn!("\tfailed to remove partial upload {:?}: {}", target, err);
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FolderListing;
    use crate::server::app;
    use axum::http::header;

    const BOUNDARY: &str = "dropshare-test-boundary";

    fn site(dir: &tempfile::TempDir) -> Arc<Site> {
        Arc::new(Site {
            root: dir.path().to_path_buf(),
        })
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn multipart(method: &str, uri: &str, files: &[(&str, &str)]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, contents) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, name
                )
                .as_bytes(),
            );
            body.extend_from_slice(contents.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(site: &Arc<Site>, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = app(site.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn missing_path_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(&site(&dir), get("/nope.txt")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"Not Found\n");
    }

    #[tokio::test]
    async fn serves_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello world").unwrap();

        let (status, body) = send(&site(&dir), get("/hello.txt")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"hello world");
    }

    #[tokio::test]
    async fn index_file_wins_over_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("site")).unwrap();
        std::fs::write(dir.path().join("site").join("index.htm"), "<p>htm</p>").unwrap();

        let (status, body) = send(&site(&dir), get("/site/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<p>htm</p>");

        std::fs::write(dir.path().join("site").join("index.html"), "<p>html</p>").unwrap();
        let (_, body) = send(&site(&dir), get("/site")).await;
        assert_eq!(body, b"<p>html</p>");
    }

    #[tokio::test]
    async fn lists_folders_as_html_and_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pics")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "aaa").unwrap();

        let (status, body) = send(&site(&dir), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).unwrap();
        assert!(html.find("pics/").unwrap() < html.find("a.txt").unwrap());
        assert!(html.contains("addEventListener('drop'"));

        let (_, body) = send(&site(&dir), get("/?format=json")).await;
        let listing: FolderListing = serde_json::from_slice(&body).unwrap();
        assert_eq!(listing.path, "/");
        let names: Vec<_> = listing.entries.iter().map(|e| e.display_name()).collect();
        assert_eq!(names, ["pics/", "a.txt"]);
        assert_eq!(listing.entries[1].size, 3);
    }

    #[tokio::test]
    async fn dot_dot_stays_inside_root() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "secret").unwrap();

        let site = Arc::new(Site { root });
        let (status, _) = send(&site, get("/../secret.txt")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_creates_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        let site = site(&dir);

        let req = multipart("POST", "/docs", &[("a.txt", "alpha"), ("b.txt", "beta")]);
        let (status, body) = send(&site, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK\n");
        assert_eq!(std::fs::read(dir.path().join("docs/a.txt")).unwrap(), b"alpha");
        assert_eq!(std::fs::read(dir.path().join("docs/b.txt")).unwrap(), b"beta");
    }

    #[tokio::test]
    async fn post_conflict_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "original").unwrap();
        let site = site(&dir);

        let (status, body) = send(&site, multipart("POST", "/", &[("a.txt", "new")])).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, b"Conflict\n");
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"original");
    }

    #[tokio::test]
    async fn put_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a much longer original").unwrap();
        let site = site(&dir);

        let (status, _) = send(&site, multipart("PUT", "/", &[("a.txt", "short")])).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"short");
    }

    #[tokio::test]
    async fn upload_names_are_reduced_to_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let site = site(&dir);

        let req = multipart("POST", "/", &[("../../escape.txt", "x")]);
        let (status, _) = send(&site, req).await;

        assert_eq!(status, StatusCode::OK);
        assert!(dir.path().join("escape.txt").is_file());
    }

    #[tokio::test]
    async fn unusable_names_get_generated() {
        let dir = tempfile::tempdir().unwrap();
        let site = site(&dir);

        let (status, _) = send(&site, multipart("POST", "/", &[("..", "x")])).await;
        assert_eq!(status, StatusCode::OK);

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].len(), 10);
        assert!(names[0].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn plain_form_values_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nalpha\r\n\
             --{b}--\r\n",
            b = BOUNDARY
        );
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, _) = send(&site(&dir), req).await;
        assert_eq!(status, StatusCode::OK);

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.txt"]);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"alpha");
    }

    #[tokio::test]
    async fn non_utf8_paths_are_404() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(&site(&dir), get("/bad%FF.txt")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"Not Found\n");
    }

    #[tokio::test]
    async fn upload_into_missing_folder_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let req = multipart("POST", "/missing/", &[("a.txt", "x")]);

        let (status, _) = send(&site(&dir), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_methods_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder()
            .method("DELETE")
            .uri("/a.txt")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(&site(&dir), req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn generated_names_are_alphanumeric() {
        let name = generate_filename();
        assert_eq!(name.len(), 10);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
