use clap::{Parser, Subcommand, ValueEnum};
use mediafetch::reference::{FormatRequest, MediaKind};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mediafetch")]
#[command(about = "Fetch media files through a chain of fallback strategies", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to config/mediafetch.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a media file, or report the cached copy
    Fetch(FetchArgs),
    /// Print descriptive metadata
    Info(LookupArgs),
    /// List downloadable formats
    Formats(LookupArgs),
    /// Search and print results
    Search(SearchArgs),
    /// Print media ids contained in a playlist
    Playlist(PlaylistArgs),
    /// Download a fresh credential file from the configured source
    RefreshCookies,
    /// Run the HTTP server
    Serve(ServeArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Audio,
    Video,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// Link or 11-character media id
    pub input: String,

    #[arg(long, value_enum, default_value_t = KindArg::Audio)]
    pub kind: KindArg,

    /// Download this format id instead of the kind's default selection
    #[arg(long)]
    pub format_id: Option<String>,

    /// Output title used with --format-id
    #[arg(long, requires = "format_id")]
    pub title: Option<String>,

    /// With --format-id, transcode to audio instead of merging video
    #[arg(long, requires = "format_id")]
    pub audio: bool,

    /// Overall deadline in seconds
    #[arg(long)]
    pub deadline: Option<u64>,
}

impl FetchArgs {
    pub fn media_kind(&self) -> MediaKind {
        match &self.format_id {
            Some(format_id) => MediaKind::ExplicitFormat(FormatRequest {
                format_id: format_id.clone(),
                title: self.title.clone().unwrap_or_else(|| format_id.clone()),
                audio: self.audio,
            }),
            None => match self.kind {
                KindArg::Audio => MediaKind::Audio,
                KindArg::Video => MediaKind::Video,
            },
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline.map(Duration::from_secs)
    }
}

#[derive(clap::Args, Debug)]
pub struct LookupArgs {
    /// Link or 11-character media id
    pub input: String,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    pub query: String,

    /// Print only the result at this 0-based position
    #[arg(long)]
    pub index: Option<usize>,

    #[arg(long, default_value_t = 5)]
    pub limit: usize,
}

#[derive(clap::Args, Debug)]
pub struct PlaylistArgs {
    /// Playlist link or bare playlist id
    pub link: String,

    #[arg(long, default_value_t = 25)]
    pub limit: usize,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}
