use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::Request,
    http::{StatusCode, Uri},
    routing::{delete, get, post},
};
use regex::Regex;
use tower::Service;
use tracing::{error, info};

use crate::cache::ThumbnailCache;
use crate::govern::RenditionGate;
use crate::http::{api, stream};
use crate::linked::LinkedFolderStore;
use common::config::MvConfig;

// application context handed to every handler through axum state
//
// the rendition gate lives here rather than in a module-global so that its
// scope is explicit and tests can build isolated instances
#[derive(Debug)]
pub struct HttpEndpoint {
    pub config: Arc<MvConfig>,
    pub gate: RenditionGate,
    pub cache: ThumbnailCache,
    pub linked: LinkedFolderStore,
    pub range_regex: Regex,
}

impl HttpEndpoint {
    pub async fn new(config: Arc<MvConfig>) -> Result<Self> {
        let gate = RenditionGate::new(config.rendition.max_concurrent);

        let cache = ThumbnailCache::new(
            config.cache.thumbnail_dir.clone(),
            config.cache.eviction.clone(),
        );

        let linked = LinkedFolderStore::load(&config.fs.data_dir).await?;

        let range_regex = Regex::new(r"(\d*)-(\d*)")?;

        Ok(HttpEndpoint {
            config,
            gate,
            cache,
            linked,
            range_regex,
        })
    }
}

pub fn build_router(state: Arc<HttpEndpoint>) -> Router {
    Router::new()
        .route("/api/files", get(api::list_files))
        .route("/api/scan-folder", post(api::scan_folder))
        .route(
            "/api/linked-folders",
            get(api::list_linked_folders)
                .post(api::add_linked_folder)
                .delete(api::remove_linked_folder),
        )
        .route("/api/thumbnail/{token}", get(api::get_thumbnail))
        .route("/media/{*path}", get(stream::stream_media))
        .route("/linked-media/{token}", get(stream::stream_linked))
        .route("/api/cache-stats", get(api::cache_stats))
        .route("/api/cache", delete(api::clear_cache))
        .route("/api/health", get(api::health))
        .fallback(fallback)
        .with_state(state)
}

pub async fn serve_http(socket: SocketAddr, state: Arc<HttpEndpoint>) -> Result<()> {
    let router = build_router(state);

    let service = hyper::service::service_fn(move |request: Request<hyper::body::Incoming>| {
        router.clone().call(request)
    });

    let listener = tokio::net::TcpListener::bind(socket).await?;

    info!("listening on {socket}");

    // the main http server loop
    while let Ok((stream, _)) = listener.accept().await {
        let service = service.clone();

        let io = hyper_util::rt::TokioIo::new(stream);

        tokio::task::spawn(async move {
            match hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                Ok(()) => (),
                Err(err) => error!({error = %err}, "connection error"),
            }
        });
    }

    Ok(())
}

async fn fallback(_uri: Uri) -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use axum::body::Body;
    use http::header::{CACHE_CONTROL, CONTENT_RANGE, CONTENT_TYPE, RANGE, RETRY_AFTER};
    use http::{Method, Request as HttpRequest};
    use http_body_util::BodyExt;
    use image::{GenericImageView, RgbImage};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use common::config::{CacheConfig, EvictionPolicy, FsConfig, HttpConfig, RenditionConfig};
    use common::token::encode_path;

    struct TestEnv {
        media: TempDir,
        _cache: TempDir,
        data: TempDir,
    }

    async fn router_with<F>(mutate: F) -> (Router, TestEnv)
    where
        F: FnOnce(&mut MvConfig),
    {
        let env = TestEnv {
            media: tempfile::tempdir().unwrap(),
            _cache: tempfile::tempdir().unwrap(),
            data: tempfile::tempdir().unwrap(),
        };

        let mut config = MvConfig {
            http: HttpConfig {
                socket: String::from("127.0.0.1:0"),
                url_root: String::new(),
            },
            fs: FsConfig {
                media_root: env.media.path().to_path_buf(),
                data_dir: env.data.path().to_path_buf(),
                linked_max_depth: 10,
            },
            cache: CacheConfig {
                thumbnail_dir: env._cache.path().to_path_buf(),
                eviction: EvictionPolicy::NoEviction,
            },
            rendition: RenditionConfig {
                max_concurrent: 10,
                thumbnail_size: 400,
                // no real ffmpeg in the test environment
                ffmpeg_path: String::from("mediavault-test-no-ffmpeg"),
                ffmpeg_timeout_secs: 2,
                video_offset_secs: 1,
            },
        };

        mutate(&mut config);

        let state = Arc::new(HttpEndpoint::new(Arc::new(config)).await.unwrap());

        (build_router(state), env)
    }

    async fn test_router() -> (Router, TestEnv) {
        router_with(|_| {}).await
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        RgbImage::new(width, height).save(&path).unwrap();
        path
    }

    async fn send(router: &Router, request: HttpRequest<Body>) -> http::Response<Body> {
        router.clone().oneshot(request).await.unwrap()
    }

    async fn get_uri(router: &Router, uri: &str) -> http::Response<Body> {
        send(
            router,
            HttpRequest::builder().uri(uri).body(Body::empty()).unwrap(),
        )
        .await
    }

    async fn body_bytes(response: http::Response<Body>) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (router, _env) = test_router().await;

        let response = get_uri(&router, "/api/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (router, _env) = test_router().await;

        let response = get_uri(&router, "/api/does-not-exist").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_files_returns_descriptors() {
        let (router, env) = test_router().await;

        write_png(env.media.path(), "photo.png", 16, 16);
        std::fs::write(env.media.path().join("notes.txt"), b"skip").unwrap();

        let response = get_uri(&router, "/api/files").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();

        let files = body.as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["name"], "photo.png");
        assert_eq!(files[0]["type"], "image");
        assert_eq!(files[0]["folder"], ".");
        assert_eq!(files[0]["url"], "/media/photo.png");
    }

    #[tokio::test]
    async fn scan_folder_reports_stats() {
        let (router, _env) = test_router().await;

        let target = tempfile::tempdir().unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            std::fs::write(target.path().join(name), b"img").unwrap();
        }
        for name in ["d.mp4", "e.mp4"] {
            std::fs::write(target.path().join(name), b"vid").unwrap();
        }
        std::fs::write(target.path().join("skip.txt"), b"txt").unwrap();

        let request = json_request(
            Method::POST,
            "/api/scan-folder",
            serde_json::json!({"path": target.path().to_string_lossy()}),
        );

        let response = send(&router, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();

        assert_eq!(body["totalFiles"], 5);
        assert_eq!(body["stats"]["images"], 3);
        assert_eq!(body["stats"]["videos"], 2);
        assert_eq!(body["stats"]["audio"], 0);

        let files = body["files"].as_array().unwrap();
        assert!(files.iter().all(|f| f["name"] != "skip.txt"));
    }

    #[tokio::test]
    async fn scan_folder_rejects_bad_paths() {
        let (router, _env) = test_router().await;

        let relative = json_request(
            Method::POST,
            "/api/scan-folder",
            serde_json::json!({"path": "not/absolute"}),
        );
        assert_eq!(
            send(&router, relative).await.status(),
            StatusCode::BAD_REQUEST
        );

        let missing = json_request(
            Method::POST,
            "/api/scan-folder",
            serde_json::json!({"path": "/definitely/not/a/real/dir"}),
        );
        assert_eq!(send(&router, missing).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn linked_folder_crud() {
        let (router, _env) = test_router().await;

        let target = tempfile::tempdir().unwrap();
        std::fs::write(target.path().join("a.jpg"), b"img").unwrap();
        std::fs::write(target.path().join("b.mp4"), b"vid").unwrap();

        let path = target.path().to_string_lossy().into_owned();

        let add = json_request(
            Method::POST,
            "/api/linked-folders",
            serde_json::json!({"path": path, "name": "external"}),
        );

        let response = send(&router, add).await;
        assert_eq!(response.status(), StatusCode::OK);

        let added: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(added["name"], "external");
        assert_eq!(added["fileCount"], 2);

        let response = get_uri(&router, "/api/linked-folders").await;
        let listed: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let remove = json_request(
            Method::DELETE,
            "/api/linked-folders",
            serde_json::json!({"path": path}),
        );
        assert_eq!(send(&router, remove).await.status(), StatusCode::NO_CONTENT);

        let response = get_uri(&router, "/api/linked-folders").await;
        let listed: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(listed.as_array().unwrap().is_empty());

        // removing again is a 404
        let remove = json_request(
            Method::DELETE,
            "/api/linked-folders",
            serde_json::json!({"path": target.path().to_string_lossy()}),
        );
        assert_eq!(send(&router, remove).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn linked_media_streams_by_token() {
        let (router, env) = test_router().await;

        // a file outside the primary media root
        let outside = env.data.path().join("external.jpg");
        std::fs::write(&outside, b"external bytes").unwrap();

        let token = encode_path(&outside);

        let response = get_uri(&router, &format!("/linked-media/{token}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            "public, max-age=31536000"
        );

        assert_eq!(body_bytes(response).await, b"external bytes");
    }

    #[tokio::test]
    async fn linked_media_rejects_bad_tokens() {
        let (router, _env) = test_router().await;

        let response = get_uri(&router, "/linked-media/!!!bad!!!").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // well-formed token for a path that does not exist
        let token = encode_path(Path::new("/no/such/file.jpg"));
        let response = get_uri(&router, &format!("/linked-media/{token}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn media_streams_with_headers() {
        let (router, env) = test_router().await;

        std::fs::write(env.media.path().join("clip.mp4"), b"0123456789").unwrap();

        let response = get_uri(&router, "/media/clip.mp4").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "video/mp4"
        );
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            "public, max-age=31536000"
        );

        assert_eq!(body_bytes(response).await, b"0123456789");
    }

    #[tokio::test]
    async fn media_serves_byte_ranges() {
        let (router, env) = test_router().await;

        std::fs::write(env.media.path().join("clip.mp4"), b"0123456789").unwrap();

        let request = HttpRequest::builder()
            .uri("/media/clip.mp4")
            .header(RANGE, "bytes=2-5")
            .body(Body::empty())
            .unwrap();

        let response = send(&router, request).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(CONTENT_RANGE).unwrap(),
            "bytes 2-5/10"
        );

        assert_eq!(body_bytes(response).await, b"2345");
    }

    #[tokio::test]
    async fn media_traversal_is_not_found() {
        let (router, env) = test_router().await;

        std::fs::write(env.media.path().join("real.jpg"), b"img").unwrap();

        for uri in [
            "/media/../secret.txt",
            "/media/../../etc/passwd",
            "/media/sub/../../../etc/passwd",
        ] {
            let response = get_uri(&router, uri).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri {uri}");
            assert!(body_bytes(response).await.len() < 100);
        }

        // missing but contained file is also a plain 404
        let response = get_uri(&router, "/media/absent.jpg").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn thumbnail_is_bounded_and_served_from_cache() {
        let (router, env) = test_router().await;

        let src = write_png(env.media.path(), "big.png", 800, 600);
        let token = encode_path(&src);

        let response = get_uri(&router, &format!("/api/thumbnail/{token}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/jpeg");
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            "public, max-age=31536000, immutable"
        );

        let first = body_bytes(response).await;

        let thumb = image::load_from_memory(&first).unwrap();
        let (width, height) = thumb.dimensions();
        assert!(width <= 400 && height <= 400);

        // corrupt the source; a second request must still come back
        // byte-identical from the cache without re-invoking the backend
        std::fs::write(&src, b"no longer an image").unwrap();

        let response = get_uri(&router, &format!("/api/thumbnail/{token}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, first);
    }

    #[tokio::test]
    async fn thumbnail_image_fallback_serves_original() {
        let (router, env) = test_router().await;

        // .jpg extension, but not decodable by the image backend
        let src = env.media.path().join("broken.jpg");
        std::fs::write(&src, b"not really a jpeg").unwrap();

        let token = encode_path(&src);

        let response = get_uri(&router, &format!("/api/thumbnail/{token}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            "public, max-age=31536000"
        );

        assert_eq!(body_bytes(response).await, b"not really a jpeg");
    }

    #[tokio::test]
    async fn thumbnail_video_fallback_is_no_content() {
        let (router, env) = test_router().await;

        let src = env.media.path().join("clip.mp4");
        std::fs::write(&src, b"not a video").unwrap();

        let token = encode_path(&src);

        let response = get_uri(&router, &format!("/api/thumbnail/{token}")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn thumbnail_audio_is_unsupported() {
        let (router, env) = test_router().await;

        let src = env.media.path().join("song.mp3");
        std::fs::write(&src, b"audio bytes").unwrap();

        let token = encode_path(&src);

        let response = get_uri(&router, &format!("/api/thumbnail/{token}")).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn thumbnail_overload_is_retryable() {
        let (router, env) = router_with(|config| {
            // saturated from the start
            config.rendition.max_concurrent = 0;
        })
        .await;

        let src = write_png(env.media.path(), "busy.png", 32, 32);
        let token = encode_path(&src);

        let response = get_uri(&router, &format!("/api/thumbnail/{token}")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "1");
    }

    #[tokio::test]
    async fn thumbnail_token_errors() {
        let (router, _env) = test_router().await;

        let response = get_uri(&router, "/api/thumbnail/!!!bad!!!").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let token = encode_path(Path::new("/no/such/file.png"));
        let response = get_uri(&router, &format!("/api/thumbnail/{token}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cache_stats_and_clear() {
        let (router, env) = test_router().await;

        let src = write_png(env.media.path(), "cached.png", 64, 64);
        let token = encode_path(&src);

        let response = get_uri(&router, &format!("/api/thumbnail/{token}")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get_uri(&router, "/api/cache-stats").await;
        let stats: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(stats["files"], 1);
        assert!(stats["sizeBytes"].as_u64().unwrap() > 0);
        assert!(stats["sizeFormatted"].as_str().is_some());

        let request = HttpRequest::builder()
            .method(Method::DELETE)
            .uri("/api/cache")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&router, request).await.status(), StatusCode::NO_CONTENT);

        let response = get_uri(&router, "/api/cache-stats").await;
        let stats: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(stats["files"], 0);
    }
}
