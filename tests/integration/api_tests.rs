//! API integration tests for preview retrieval and error handling.
//!
//! Tests verify:
//! - Fill previews for JPEG, PNG and WebP sources
//! - Source URL handling (implicit scheme, query passthrough, header forwarding)
//! - Error cases and their HTTP status codes

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use image::ImageFormat;
use tower::ServiceExt;

use image_previewer::RouterConfig;

use super::test_utils::{
    create_gif, create_jpeg, create_png, create_tiff, create_webp, inspect, router_with, MockFetcher,
};

const CAT_URL: &str = "http://origin.test/cat.jpg";

async fn get(router: axum::Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (router, _) = router_with(Arc::new(MockFetcher::new()), 10, RouterConfig::new());

    let response = get(router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// Preview Retrieval
// =============================================================================

#[tokio::test]
async fn test_jpeg_preview_success() {
    let fetcher = Arc::new(MockFetcher::new().with_image(CAT_URL, create_jpeg(800, 600)));
    let (router, _) = router_with(fetcher, 10, RouterConfig::new());

    let response = get(router, "/fill/400/400/http://origin.test/cat.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "image/jpeg");
    assert_eq!(headers.get("cache-control").unwrap(), "public, max-age=3600");
    assert_eq!(headers.get("x-preview-cache-hit").unwrap(), "false");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(inspect(&body), (ImageFormat::Jpeg, 400, 400));
}

#[tokio::test]
async fn test_width_only_preserves_aspect_ratio() {
    let fetcher = Arc::new(MockFetcher::new().with_image(CAT_URL, create_jpeg(800, 600)));
    let (router, _) = router_with(fetcher, 10, RouterConfig::new());

    let response = get(router, "/fill/400/0/http://origin.test/cat.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(inspect(&body), (ImageFormat::Jpeg, 400, 300));
}

#[tokio::test]
async fn test_png_preview_keeps_format() {
    let url = "http://origin.test/logo.png";
    let fetcher = Arc::new(MockFetcher::new().with_image(url, create_png(120, 80)));
    let (router, _) = router_with(fetcher, 10, RouterConfig::new());

    let response = get(router, "/fill/60/60/http://origin.test/logo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(inspect(&body), (ImageFormat::Png, 60, 60));
}

#[tokio::test]
async fn test_webp_preview_keeps_format() {
    let url = "http://origin.test/photo.webp";
    let fetcher = Arc::new(MockFetcher::new().with_image(url, create_webp(200, 100)));
    let (router, _) = router_with(fetcher, 10, RouterConfig::new());

    let response = get(router, "/fill/50/50/http://origin.test/photo.webp").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/webp");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(inspect(&body), (ImageFormat::WebP, 50, 50));
}

#[tokio::test]
async fn test_format_follows_bytes_not_extension() {
    // PNG bytes behind a .jpg URL come back as PNG
    let fetcher = Arc::new(MockFetcher::new().with_image(CAT_URL, create_png(100, 100)));
    let (router, _) = router_with(fetcher, 10, RouterConfig::new());

    let response = get(router, "/fill/20/20/http://origin.test/cat.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
}

#[tokio::test]
async fn test_source_without_scheme_assumes_http() {
    let fetcher = Arc::new(MockFetcher::new().with_image(CAT_URL, create_jpeg(64, 64)));
    let (router, _) = router_with(fetcher.clone(), 10, RouterConfig::new());

    let response = get(router, "/fill/32/32/origin.test/cat.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fetcher.fetched_urls(), vec![CAT_URL.to_string()]);
}

#[tokio::test]
async fn test_query_string_passed_to_source() {
    let url = "http://origin.test/cat.jpg?token=abc&v=2";
    let fetcher = Arc::new(MockFetcher::new().with_image(url, create_jpeg(64, 64)));
    let (router, _) = router_with(fetcher.clone(), 10, RouterConfig::new());

    let response = get(router, "/fill/32/32/origin.test/cat.jpg?token=abc&v=2").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fetcher.fetched_urls(), vec![url.to_string()]);
}

#[tokio::test]
async fn test_client_headers_forwarded_to_origin() {
    let fetcher = Arc::new(MockFetcher::new().with_image(CAT_URL, create_jpeg(64, 64)));
    let (router, _) = router_with(fetcher.clone(), 10, RouterConfig::new());

    let request = Request::builder()
        .uri("/fill/32/32/http://origin.test/cat.jpg")
        .header("host", "previewer.local")
        .header("authorization", "Bearer secret")
        .header("connection", "keep-alive")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = fetcher.last_headers().unwrap();
    assert_eq!(headers.get("authorization").unwrap(), "Bearer secret");
    assert!(headers.get("host").is_none());
    assert!(headers.get("connection").is_none());
}

#[tokio::test]
async fn test_custom_cache_max_age() {
    let fetcher = Arc::new(MockFetcher::new().with_image(CAT_URL, create_jpeg(64, 64)));
    let (router, _) = router_with(fetcher, 10, RouterConfig::new().with_cache_max_age(60));

    let response = get(router, "/fill/32/32/http://origin.test/cat.jpg").await;
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=60"
    );
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_unknown_operation_rejected() {
    let fetcher = Arc::new(MockFetcher::new().with_image(CAT_URL, create_jpeg(64, 64)));
    let (router, _) = router_with(fetcher.clone(), 10, RouterConfig::new());

    let response = get(router, "/rotate/32/32/http://origin.test/cat.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["error"], "unknown_operation");
    assert_eq!(json["status"], 400);
    assert_eq!(fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn test_invalid_dimension_rejected() {
    let (router, _) = router_with(Arc::new(MockFetcher::new()), 10, RouterConfig::new());

    let response = get(router, "/fill/abc/32/http://origin.test/cat.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_dimension");
}

#[tokio::test]
async fn test_dimension_over_limit_rejected() {
    let (router, _) = router_with(
        Arc::new(MockFetcher::new()),
        10,
        RouterConfig::new().with_max_dimension(100),
    );

    let response = get(router, "/fill/101/32/http://origin.test/cat.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["error"], "dimension_too_large");
}

#[tokio::test]
async fn test_origin_not_found_is_bad_gateway() {
    let (router, _) = router_with(Arc::new(MockFetcher::new()), 10, RouterConfig::new());

    let response = get(router, "/fill/32/32/http://origin.test/missing.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = json_body(response).await;
    assert_eq!(json["error"], "bad_origin_status");
    assert!(json["message"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_undecodable_source() {
    let fetcher = Arc::new(MockFetcher::new().with_image(CAT_URL, b"not an image".to_vec()));
    let (router, _) = router_with(fetcher, 10, RouterConfig::new());

    let response = get(router, "/fill/32/32/http://origin.test/cat.jpg").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = json_body(response).await;
    assert_eq!(json["error"], "decode_error");
}

#[tokio::test]
async fn test_unsupported_source_format() {
    let url = "http://origin.test/anim.gif";
    let fetcher = Arc::new(MockFetcher::new().with_image(url, create_gif(40, 40)));
    let (router, service) = router_with(fetcher, 10, RouterConfig::new());

    let response = get(router, "/fill/20/20/http://origin.test/anim.gif").await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let json = json_body(response).await;
    assert_eq!(json["error"], "unsupported_format");
    assert!(service.cache().is_empty().await);
}

#[tokio::test]
async fn test_tiff_source_is_unsupported() {
    let url = "http://origin.test/scan.tiff";
    let fetcher = Arc::new(MockFetcher::new().with_image(url, create_tiff()));
    let (router, service) = router_with(fetcher, 10, RouterConfig::new());

    let response = get(router, "/fill/20/20/http://origin.test/scan.tiff").await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let json = json_body(response).await;
    assert_eq!(json["error"], "unsupported_format");
    assert!(json["message"].as_str().unwrap().contains("tiff"));
    assert!(service.cache().is_empty().await);
}

#[tokio::test]
async fn test_deadline_returns_gateway_timeout() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_image(CAT_URL, create_jpeg(64, 64))
            .with_delay(Duration::from_secs(5)),
    );
    let (router, service) = router_with(
        fetcher,
        10,
        RouterConfig::new().with_timeout(Duration::from_millis(50)),
    );

    let response = get(router, "/fill/32/32/http://origin.test/cat.jpg").await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(service.cache().is_empty().await);
}

#[tokio::test]
async fn test_unmatched_route_is_not_found() {
    let (router, _) = router_with(Arc::new(MockFetcher::new()), 10, RouterConfig::new());

    let response = get(router, "/fill/32").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
