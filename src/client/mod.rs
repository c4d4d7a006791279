//! Drop-and-upload flow.
//!
//! A drop is an ordered batch of files. Each file is created on the server
//! with `POST`; a `409 Conflict` asks the user whether to overwrite, and a
//! confirmed overwrite is sent once more with `PUT`. When the whole batch
//! went through, the page is reloaded. Any other failure stops the batch and
//! skips the reload.
//!
//! Network, user interaction and the page are reached through the
//! [`Transport`], [`Prompt`] and [`Page`] traits so the flow itself does not
//! depend on reqwest or a terminal.

pub mod http;
pub mod prompt;

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use reqwest::{Method, StatusCode};

use crate::config::PushArgs;
use crate::error::{ClientError, ClientResult};
use self::http::{HttpPage, HttpTransport};
use self::prompt::{AlwaysConfirm, TerminalPrompt};

const USER_AGENT: &str = concat!("dropshare/", env!("CARGO_PKG_VERSION"));

/// A file taken from a drop, read once and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedFile {
    pub name: String,
    pub contents: Bytes,
}

impl DroppedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    pub async fn read(path: &Path) -> ClientResult<Self> {
        let contents = tokio::fs::read(path).await.map_err(|source| ClientError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, contents))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadMethod {
    Create,
    Replace,
}

impl UploadMethod {
    pub fn as_http(self) -> Method {
        match self {
            UploadMethod::Create => Method::POST,
            UploadMethod::Replace => Method::PUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Created,
    Replaced,
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropReport {
    pub outcomes: Vec<(String, UploadOutcome)>,
}

pub trait Transport: Send + Sync {
    /// Sends `file` as the single `file` part of a multipart body.
    fn send(
        &self,
        method: UploadMethod,
        file: &DroppedFile,
    ) -> impl Future<Output = ClientResult<StatusCode>> + Send;
}

pub trait Prompt: Send + Sync {
    /// Blocking yes/no question.
    fn confirm(&self, message: &str) -> bool;
}

pub trait Page: Send + Sync {
    fn reload(&self) -> impl Future<Output = ClientResult<()>> + Send;
}

pub fn overwrite_message(name: &str) -> String {
    format!("{} already exists. Overwrite?", name)
}

fn ensure_success(status: StatusCode) -> ClientResult<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ClientError::Status(status))
    }
}

pub struct Uploader<T, P> {
    transport: T,
    prompt: P,
}

impl<T: Transport, P: Prompt> Uploader<T, P> {
    pub fn new(transport: T, prompt: P) -> Self {
        Self { transport, prompt }
    }

    /// Create, and on conflict replace at most once if the user agrees.
    pub async fn upload(&self, file: &DroppedFile) -> ClientResult<UploadOutcome> {
        let status = self.transport.send(UploadMethod::Create, file).await?;
        // unlike a bare fetch, non-2xx answers other than 409 abort the drop
        if status != StatusCode::CONFLICT {
            ensure_success(status)?;
            return Ok(UploadOutcome::Created);
        }

        if !self.prompt.confirm(&overwrite_message(&file.name)) {
            tracing::info!("skipping {:?}", file.name);
            return Ok(UploadOutcome::Skipped);
        }

        let status = self.transport.send(UploadMethod::Replace, file).await?;
        ensure_success(status)?;
        Ok(UploadOutcome::Replaced)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropEffect {
    None,
    Copy,
}

#[derive(Debug)]
pub enum DragEvent {
    DragOver,
    Drop(Vec<DroppedFile>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventResponse {
    pub default_prevented: bool,
    pub drop_effect: DropEffect,
    pub report: Option<DropReport>,
}

impl EventResponse {
    fn ignored() -> Self {
        Self {
            default_prevented: false,
            drop_effect: DropEffect::None,
            report: None,
        }
    }
}

pub struct DropListener<T, P, G> {
    uploader: Uploader<T, P>,
    page: G,
}

impl<T: Transport, P: Prompt, G: Page> DropListener<T, P, G> {
    pub fn new(uploader: Uploader<T, P>, page: G) -> Self {
        Self { uploader, page }
    }

    pub async fn handle(&self, event: DragEvent) -> ClientResult<EventResponse> {
        match event {
            DragEvent::DragOver => Ok(EventResponse {
                default_prevented: true,
                drop_effect: DropEffect::None,
                report: None,
            }),
            DragEvent::Drop(files) => {
                let report = self.handle_drop(files).await?;
                Ok(EventResponse {
                    default_prevented: true,
                    drop_effect: DropEffect::Copy,
                    report: Some(report),
                })
            }
        }
    }

    pub async fn handle_drop(&self, files: Vec<DroppedFile>) -> ClientResult<DropReport> {
        let mut report = DropReport::default();

        for (completed, file) in files.into_iter().enumerate() {
            match self.uploader.upload(&file).await {
                Ok(outcome) => report.outcomes.push((file.name, outcome)),
                Err(err) => {
                    return Err(ClientError::Upload {
                        file: file.name,
                        completed,
                        source: Box::new(err),
                    })
                }
            }
        }

        self.page.reload().await?;
        Ok(report)
    }
}

/// Holds at most one listener for page-wide drag events.
pub struct DropTarget<L> {
    listener: Mutex<Option<Arc<L>>>,
}

/// Keeps a listener installed until dropped.
pub struct Registration<'a, L> {
    target: &'a DropTarget<L>,
    installed: Arc<L>,
}

impl<L> Registration<'_, L> {
    pub fn unregister(self) {}
}

impl<L> Drop for Registration<'_, L> {
    fn drop(&mut self) {
        let mut slot = self.target.listener.lock().unwrap_or_else(|e| e.into_inner());
        // a later registration owns the slot now
        if slot.as_ref().map_or(false, |l| Arc::ptr_eq(l, &self.installed)) {
            *slot = None;
        }
    }
}

impl<L> Default for DropTarget<L> {
    fn default() -> Self {
        Self {
            listener: Mutex::new(None),
        }
    }
}

impl<L> DropTarget<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: L) -> Registration<'_, L> {
        let installed = Arc::new(listener);
        let mut slot = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        if slot.replace(installed.clone()).is_some() {
            tracing::warn!("replacing an already registered drop listener");
        }
        Registration {
            target: self,
            installed,
        }
    }

    fn current(&self) -> Option<Arc<L>> {
        self.listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl<T: Transport, P: Prompt, G: Page> DropTarget<DropListener<T, P, G>> {
    pub async fn dispatch(&self, event: DragEvent) -> ClientResult<EventResponse> {
        match self.current() {
            Some(listener) => listener.handle(event).await,
            None => Ok(EventResponse::ignored()),
        }
    }
}

async fn run_drop<P: Prompt>(
    transport: HttpTransport,
    prompt: P,
    page: HttpPage,
    files: Vec<DroppedFile>,
) -> ClientResult<EventResponse> {
    let target = DropTarget::new();
    let registration = target.register(DropListener::new(Uploader::new(transport, prompt), page));

    target.dispatch(DragEvent::DragOver).await?;
    let response = target.dispatch(DragEvent::Drop(files)).await;

    registration.unregister();
    response
}

/// Uploads the given files as a single drop onto the folder at `args.to`.
pub async fn push(args: PushArgs) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(DroppedFile::read(path).await?);
    }

    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let transport = HttpTransport::new(client.clone(), args.to.clone());
    let page = HttpPage::new(client, args.to);

    let response = if args.yes {
        run_drop(transport, AlwaysConfirm, page, files).await?
    } else {
        run_drop(transport, TerminalPrompt, page, files).await?
    };

    for (name, outcome) in response.report.map(|r| r.outcomes).unwrap_or_default() {
        tracing::info!("{:?}: {:?}", name, outcome);
    }
    Ok(())
}
