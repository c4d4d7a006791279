use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode, Url,
};

use super::{DroppedFile, Page, Transport, UploadMethod};
use crate::error::ClientResult;
use crate::models::FolderListing;
use crate::server::listing::fmt_bytes;

/// Uploads to the folder at `url`, the same path the listing page lives on.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, method: UploadMethod, file: &DroppedFile) -> ClientResult<StatusCode> {
        let len = file.contents.len() as u64;
        let part = Part::stream_with_length(file.contents.clone(), len)
            .file_name(file.name.clone());
        let form = Form::new().part("file", part);

        tracing::debug!("{} {:?} to {}", method.as_http(), file.name, self.url);
        let res = self
            .client
            .request(method.as_http(), self.url.clone())
            .multipart(form)
            .send()
            .await?;

        Ok(res.status())
    }
}

/// Re-fetches the folder listing and prints it.
#[derive(Debug, Clone)]
pub struct HttpPage {
    client: Client,
    url: Url,
}

impl HttpPage {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    pub async fn fetch_listing(&self) -> ClientResult<FolderListing> {
        let listing = self
            .client
            .get(self.url.clone())
            .query(&[("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json::<FolderListing>()
            .await?;
        Ok(listing)
    }
}

impl Page for HttpPage {
    async fn reload(&self) -> ClientResult<()> {
        let listing = self.fetch_listing().await?;

        println!("{}", listing.path);
        for entry in &listing.entries {
            let size = if entry.is_dir {
                "-".to_string()
            } else {
                fmt_bytes(entry.size)
            };
            println!("{:>8}  {}", size, entry.display_name());
        }
        Ok(())
    }
}
