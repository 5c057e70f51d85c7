use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument};

// single-frame extraction via ffmpeg
//
// the offset is fixed and does not adapt to clip duration; a one-second clip
// and a one-hour clip use the same extraction point

pub struct FrameExtraction<'a> {
    pub ffmpeg_path: &'a str,
    pub offset_secs: u64,
    pub scale_width: u32,
    pub budget: Duration,
}

#[instrument(skip_all, fields(path = ?original_path))]
pub async fn extract_video_frame(
    opts: &FrameExtraction<'_>,
    original_path: &Path,
    frame_path: &Path,
) -> Result<Vec<u8>> {
    debug!("started extracting video frame");

    let mut command = Command::new(opts.ffmpeg_path);

    command
        .args(["-ss", &opts.offset_secs.to_string()])
        .args(["-i", &original_path.to_string_lossy()])
        .args(["-frames:v", "1"])
        .args(["-vf", &format!("scale={}:-2", opts.scale_width)])
        .arg("-y")
        .arg(frame_path)
        .kill_on_drop(true);

    // kill_on_drop tears the subprocess down when the timeout wins the race
    let handle = timeout(opts.budget, command.output())
        .await
        .map_err(|_| anyhow::Error::msg("frame extraction timed out"))??;

    if !handle.status.success() {
        return Err(anyhow::Error::msg("ffmpeg failed to extract a frame"));
    }

    let bytes = tokio::fs::read(frame_path).await?;

    debug!("finished extracting video frame");

    Ok(bytes)
}
