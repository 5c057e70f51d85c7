use std::{path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{Level, debug, instrument};

// mediavault configuration
//
// this struct contains all of the configuration options used by the server,
// split into subtables by concern to keep the config file readable
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MvConfig {
    pub http: HttpConfig,
    pub fs: FsConfig,
    pub cache: CacheConfig,
    pub rendition: RenditionConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HttpConfig {
    // ip and port for the http server
    //
    // note that the path tokens disclose the absolute filesystem layout to
    // anyone who can reach this socket, so it should stay on localhost
    // unless something else is enforcing trust
    #[serde(default = "default_socket")]
    pub socket: String,

    // url root prepended to descriptor links, useful for reverse proxies
    #[serde(default)]
    pub url_root: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FsConfig {
    // read-only path under which the primary media library lives
    pub media_root: PathBuf,

    // read-write path for server state (linked folder records)
    pub data_dir: PathBuf,

    // maximum directory depth when scanning a linked folder; the primary
    // root is always walked in full
    #[serde(default = "default_linked_max_depth")]
    pub linked_max_depth: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CacheConfig {
    // read-write directory holding the generated thumbnails
    pub thumbnail_dir: PathBuf,

    #[serde(default)]
    pub eviction: EvictionPolicy,
}

// the original behavior is an unbounded cache, so that remains the default;
// lru evicts oldest-mtime entries until the directory fits the budget
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum EvictionPolicy {
    #[default]
    NoEviction,
    Lru {
        max_bytes: u64,
    },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RenditionConfig {
    // process-wide cap on simultaneous rendition operations
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    // bounding box for generated previews; images smaller than this are
    // re-encoded but never enlarged
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    // frame extraction tool and its wall-clock budget
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffmpeg_timeout")]
    pub ffmpeg_timeout_secs: u64,

    // fixed extraction offset, independent of clip duration
    #[serde(default = "default_video_offset")]
    pub video_offset_secs: u64,
}

fn default_socket() -> String {
    String::from("127.0.0.1:3001")
}

fn default_linked_max_depth() -> usize {
    10
}

fn default_max_concurrent() -> usize {
    10
}

fn default_thumbnail_size() -> u32 {
    400
}

fn default_ffmpeg_path() -> String {
    String::from("ffmpeg")
}

fn default_ffmpeg_timeout() -> u64 {
    15
}

fn default_video_offset() -> u64 {
    1
}

// in order to extract the config table from a larger document, we need to specify it
// as a subtable of the root node, i.e. a substruct
#[derive(Debug, Deserialize, Serialize)]
struct TomlConfigFile {
    config: MvConfig,
}

#[instrument(level=Level::DEBUG)]
pub async fn read_config(filename: PathBuf) -> Arc<MvConfig> {
    debug!("reading config file");

    let doc = tokio::fs::read_to_string(filename)
        .await
        .expect("failed to read config file");

    let data: TomlConfigFile = match toml::from_str(&doc) {
        Ok(val) => val,
        Err(err) => panic!("failed to parse config file: {err}"),
    };

    debug!("successfully parsed config file");
    Arc::new(data.config)
}
