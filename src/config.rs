use std::{net::IpAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "dropshare", version, about = "Share a folder over HTTP with drag-and-drop uploads")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve a folder with listings and uploads
    Serve(ServeArgs),
    /// Upload files to a served folder, one after another
    Push(PushArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind the web server on
    #[arg(long, env = "DROPSHARE_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to bind the web server on
    #[arg(long, env = "DROPSHARE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path of the folder to expose
    #[arg(long, env = "DROPSHARE_FOLDER", default_value = ".")]
    pub folder: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct PushArgs {
    /// URL of the served folder to upload into
    #[arg(long, env = "DROPSHARE_URL")]
    pub to: reqwest::Url,

    /// Overwrite existing files without asking
    #[arg(long, short)]
    pub yes: bool,

    /// Files to upload, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Loads `.env` from the working directory before anything reads the
/// environment. A missing file yields `Ok(None)`.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenv::Error> {
    match dotenv::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
