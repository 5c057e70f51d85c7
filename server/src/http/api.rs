use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use tracing::{debug, instrument, warn};

use crate::fs::scan::{UrlStyle, scan_media, scan_report};
use crate::http::{HttpError, stream::serve_original, svc::HttpEndpoint};
use api::cache::{CacheStatsResp, format_size};
use api::folder::{AddLinkedFolderReq, LinkedFolder, RemoveLinkedFolderReq, ScanFolderReq};
use api::media::MediaKind;
use common::media::{classify, image::create_image_thumbnail, video};
use common::token::decode_path;

// generated thumbnails never change for a given source, hence immutable
const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

// http handlers
//
// all of these return HttpError, which impls IntoResponse, so the handlers
// can use ? freely and still produce well-formed replies

#[instrument(skip_all)]
pub(super) async fn list_files(
    State(state): State<Arc<HttpEndpoint>>,
) -> Result<Response, HttpError> {
    debug!("listing primary media root");

    let root = state.config.fs.media_root.clone();
    let url_root = state.config.http.url_root.clone();

    // walkdir does blocking io, keep it off the runtime workers
    let files = tokio::task::spawn_blocking(move || {
        scan_media(&root, usize::MAX, &url_root, UrlStyle::PrimaryRoot)
    })
    .await?;

    Ok(Json(files).into_response())
}

#[instrument(skip_all, fields(path = %req.path))]
pub(super) async fn scan_folder(
    State(state): State<Arc<HttpEndpoint>>,
    Json(req): Json<ScanFolderReq>,
) -> Result<Response, HttpError> {
    debug!("scanning arbitrary folder");

    let path = PathBuf::from(&req.path);

    if !path.is_absolute() {
        return Err(HttpError::PathInvalid);
    }

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(HttpError::NotFound),
    }

    let max_depth = state.config.fs.linked_max_depth;
    let url_root = state.config.http.url_root.clone();

    let report =
        tokio::task::spawn_blocking(move || scan_report(&path, max_depth, &url_root)).await?;

    Ok(Json(report).into_response())
}

pub(super) async fn list_linked_folders(
    State(state): State<Arc<HttpEndpoint>>,
) -> Result<Response, HttpError> {
    Ok(Json(state.linked.list().await).into_response())
}

#[instrument(skip_all, fields(path = %req.path))]
pub(super) async fn add_linked_folder(
    State(state): State<Arc<HttpEndpoint>>,
    Json(req): Json<AddLinkedFolderReq>,
) -> Result<Response, HttpError> {
    let path = PathBuf::from(&req.path);

    if !path.is_absolute() {
        return Err(HttpError::PathInvalid);
    }

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(HttpError::NotFound),
    }

    // the record stores membership only; the count comes from a fresh scan
    // and goes stale the moment the folder changes, which is fine
    let max_depth = state.config.fs.linked_max_depth;
    let url_root = state.config.http.url_root.clone();

    let scan_path = path.clone();
    let file_count = tokio::task::spawn_blocking(move || {
        scan_media(&scan_path, max_depth, &url_root, UrlStyle::Linked).len() as u64
    })
    .await?;

    let name = req.name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("linked folder"))
    });

    let folder = LinkedFolder {
        path: req.path,
        name,
        file_count,
        added_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    state.linked.add(folder.clone()).await?;

    Ok(Json(folder).into_response())
}

pub(super) async fn remove_linked_folder(
    State(state): State<Arc<HttpEndpoint>>,
    Json(req): Json<RemoveLinkedFolderReq>,
) -> Result<Response, HttpError> {
    if !state.linked.remove(&req.path).await? {
        return Err(HttpError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

// the rendition pipeline entry point
//
// cache check, then gate, then the kind-specific backend; the gate permit
// is an raii guard, so every branch below releases it on the way out
#[instrument(skip_all)]
pub(super) async fn get_thumbnail(
    State(state): State<Arc<HttpEndpoint>>,
    UrlPath(token): UrlPath<String>,
) -> Result<Response, HttpError> {
    let path = decode_path(&token).map_err(|_| HttpError::PathInvalid)?;

    // cache hits are served without touching the governor
    if let Some(bytes) = state.cache.lookup(&path).await {
        return Ok(rendition_response(bytes));
    }

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(HttpError::NotFound),
    }

    let Some(_permit) = state.gate.try_acquire() else {
        debug!("rendition gate saturated");
        return Err(HttpError::Overloaded);
    };

    match classify(&path) {
        Some(MediaKind::Image) => {
            let src = path.clone();
            let max_dim = state.config.rendition.thumbnail_size;

            let rendered =
                tokio::task::spawn_blocking(move || create_image_thumbnail(&src, max_dim)).await?;

            match rendered {
                Ok(bytes) => {
                    state.cache.store(&path, &bytes).await?;
                    Ok(rendition_response(bytes))
                }
                Err(err) => {
                    // degrade-gracefully policy: the original bytes are
                    // better than no preview, and they are not cached as a
                    // rendition
                    warn!({path = ?path, error = %err}, "image backend failed, serving original");
                    serve_original(&path).await
                }
            }
        }
        Some(MediaKind::Video) => {
            let opts = video::FrameExtraction {
                ffmpeg_path: &state.config.rendition.ffmpeg_path,
                offset_secs: state.config.rendition.video_offset_secs,
                scale_width: state.config.rendition.thumbnail_size,
                budget: Duration::from_secs(state.config.rendition.ffmpeg_timeout_secs),
            };

            let frame_path = state.cache.scratch_path(&path);

            let extracted = video::extract_video_frame(&opts, &path, &frame_path).await;

            let _ = tokio::fs::remove_file(&frame_path).await;

            match extracted {
                Ok(bytes) => {
                    state.cache.store(&path, &bytes).await?;
                    Ok(rendition_response(bytes))
                }
                Err(err) => {
                    // the subprocess error stays on the server side; the
                    // client just gets an empty no-rendition reply
                    warn!({path = ?path, error = %err}, "frame extraction failed");
                    Ok(StatusCode::NO_CONTENT.into_response())
                }
            }
        }
        Some(MediaKind::Audio) | None => Err(HttpError::Unsupported),
    }
}

pub(super) async fn cache_stats(
    State(state): State<Arc<HttpEndpoint>>,
) -> Result<Response, HttpError> {
    let totals = state.cache.stats().await?;

    Ok(Json(CacheStatsResp {
        files: totals.files,
        size_bytes: totals.size_bytes,
        size_formatted: format_size(totals.size_bytes),
    })
    .into_response())
}

pub(super) async fn clear_cache(
    State(state): State<Arc<HttpEndpoint>>,
) -> Result<Response, HttpError> {
    let removed = state.cache.clear().await?;

    debug!({removed = removed}, "cache cleared by request");

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(super) async fn health() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

fn rendition_response(bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "image/jpeg"),
            (CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL),
        ],
        bytes,
    )
        .into_response()
}
