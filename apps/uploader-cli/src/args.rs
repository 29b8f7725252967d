//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use clipdrop_transfer::{AngleType, DEFAULT_CONTENT_TYPE};

#[derive(Debug, Clone, PartialEq, Parser)]
#[clap(name = "clipdrop", version, about("Uploads video files to an event"), long_about = None)]
pub struct Args {
    /// Event the videos belong to.
    pub event_id: String,

    #[clap(required = true, help("Video files to upload"))]
    pub files: Vec<PathBuf>,

    /// wide, closeup, crowd, goal_angle, stage or other.
    #[clap(long, default_value_t = AngleType::Other)]
    pub angle: AngleType,

    /// Content type of every file.
    #[clap(long, default_value = DEFAULT_CONTENT_TYPE)]
    pub content_type: String,

    /// API base URL (overrides config and CLIPDROP_API_URL).
    #[clap(long = "api")]
    pub api_url: Option<String>,
}
