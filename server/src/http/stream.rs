use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use http::{
    HeaderMap, HeaderValue,
    header::{ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE},
};
use mime_guess::MimeGuess;
use regex::Regex;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::codec::{BytesCodec, FramedRead};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};

use crate::http::{HttpError, svc::HttpEndpoint};
use common::token::decode_path;

// originals are treated as immutable, so both streaming handlers hand out
// year-long cache lifetimes
const ORIGINAL_CACHE_CONTROL: &str = "public, max-age=31536000";

// http handlers

// primary-root streaming: the request path is joined to the media root and
// must stay lexically inside it; any violation is a plain 404 so the caller
// cannot probe the filesystem through the error channel
#[instrument(skip_all)]
pub(super) async fn stream_media(
    headers: HeaderMap,
    State(state): State<Arc<HttpEndpoint>>,
    UrlPath(path): UrlPath<String>,
) -> Result<Response, HttpError> {
    debug!("serving primary-root media");

    // the pathbuf join() method inexplicably replaces the path if the
    // argument is absolute, so we include this explicit check
    if PathBuf::from(&path).is_absolute() {
        return Err(HttpError::NotFound);
    }

    let filename = resolve_within(&state.config.fs.media_root, Path::new(&path))
        .ok_or(HttpError::NotFound)?;

    serve_ranged(&state, &headers, &filename).await
}

// linked-media streaming: the token decodes straight to an absolute path,
// which must exist and be a regular file.  there is no single root to
// contain against here by design; tokens are only ever minted for files the
// indexer enumerated
#[instrument(skip_all)]
pub(super) async fn stream_linked(
    State(_state): State<Arc<HttpEndpoint>>,
    UrlPath(token): UrlPath<String>,
) -> Result<Response, HttpError> {
    debug!("serving linked media");

    let path = decode_path(&token).map_err(|_| HttpError::PathInvalid)?;

    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|_| HttpError::NotFound)?;

    if !meta.is_file() {
        return Err(HttpError::NotFound);
    }

    serve_original(&path).await
}

// lexically fold the relative request path onto the root: `.` is dropped,
// `..` pops, and popping past the root (or smuggling in an absolute
// component) fails the resolution outright
pub(super) fn resolve_within(root: &Path, rel: &Path) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut depth: usize = 0;

    for component in rel.components() {
        match component {
            Component::Normal(c) => {
                resolved.push(c);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(resolved)
}

// whole-file streaming body with mime + cache headers; also used by the
// thumbnail handler when the image backend degrades to original bytes
pub(super) async fn serve_original(path: &Path) -> Result<Response, HttpError> {
    let file = File::open(path).await.map_err(|_| HttpError::NotFound)?;

    let mut headers = HeaderMap::new();

    match MimeGuess::from_path(path).first() {
        Some(mime) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(mime.essence_str())?);
        }
        None => {
            warn!("failed to guess mime type");
        }
    }

    headers.insert(CACHE_CONTROL, HeaderValue::from_static(ORIGINAL_CACHE_CONTROL));

    let body = Body::from_stream(ReaderStream::new(file));

    Ok((StatusCode::OK, headers, body).into_response())
}

// range-aware streaming for the primary root, so video scrubbing works
async fn serve_ranged(
    state: &Arc<HttpEndpoint>,
    req_headers: &HeaderMap,
    filename: &Path,
) -> Result<Response, HttpError> {
    let mut file_handle = File::open(filename).await.map_err(|_| HttpError::NotFound)?;

    let meta = file_handle.metadata().await?;

    if !meta.is_file() {
        return Err(HttpError::NotFound);
    }

    let length: i64 = meta.len().try_into()?;

    let (partial, (start, end)) = match req_headers.get(RANGE) {
        None => (false, (0, length)),
        Some(val) => (
            true,
            match parse_ranges(&state.range_regex, val.to_str()?, length) {
                Ok(v) => v,
                Err(err) => {
                    return Ok(
                        (StatusCode::RANGE_NOT_SATISFIABLE, format!("{err}")).into_response()
                    );
                }
            },
        ),
    };

    // response headers
    //
    // while modern browsers can get by without most of these, they all need
    // to be correct for seeking to work
    let mut headers = HeaderMap::new();

    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    headers.insert(CONTENT_LENGTH, HeaderValue::from(end - start));

    if partial {
        headers.insert(
            CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {start}-{}/{length}", end - 1))?,
        );
    }

    match MimeGuess::from_path(filename).first() {
        Some(mime) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(mime.essence_str())?);
        }
        None => {
            warn!("failed to guess mime type");
        }
    }

    headers.insert(CACHE_CONTROL, HeaderValue::from_static(ORIGINAL_CACHE_CONTROL));

    let body = if partial {
        file_handle.seek(SeekFrom::Start(start.try_into()?)).await?;

        // limit by bytes, not frames
        let limited = file_handle.take((end - start).try_into()?);
        Body::from_stream(FramedRead::new(limited, BytesCodec::new()))
    } else {
        Body::from_stream(FramedRead::new(file_handle, BytesCodec::new()))
    };

    let code = if partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    Ok((code, headers, body).into_response())
}

// logic adapted from the usual http range grammar: a single "bytes=" range
// with optional endpoints; multiple ranges are not supported
fn parse_ranges(regex: &Regex, ranges: &str, length: i64) -> Result<(i64, i64)> {
    if !ranges.starts_with("bytes=") {
        return Err(anyhow::Error::msg("invalid range unit"));
    }

    let mut match_iter = regex
        .captures_iter(ranges)
        .map(|c| c.extract::<2>())
        .map(|(_, [s, e])| parse_endpoints(s, e));

    let (start, end) = match match_iter.next() {
        None => return Ok((0, length)),
        Some(range) => match range? {
            (Some(start), Some(end)) => (start, end + 1),
            (Some(start), None) => (start, length),
            (None, Some(end)) => (length - end, length),
            (None, None) => (0, length),
        },
    };

    if start < 0 || end <= 0 || start >= end || end > length {
        return Err(anyhow::Error::msg("invalid range"));
    }

    if match_iter.next().is_some() {
        return Err(anyhow::Error::msg("multiple ranges unsupported"));
    }

    Ok((start, end))
}

fn parse_endpoints(start: &str, end: &str) -> Result<(Option<i64>, Option<i64>)> {
    let parse = |s| match s {
        "" => Ok(None),
        s => Some(
            s.parse::<i64>()
                .map_err(|_| anyhow::Error::msg("failed to parse endpoint")),
        )
        .transpose(),
    };

    Ok((parse(start)?, parse(end)?))
}
