//! Upload API integration tests.
//!
//! Run with: `cargo test -p lumen-api --test upload_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::{png_of, setup_test_app};
use image::GenericImageView;
use serde_json::Value;

fn photo_form(width: u32, height: u32) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(png_of(width, height))
            .file_name("beach.png")
            .mime_type("image/png"),
    )
}

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_upload_photo_stores_original_and_thumbnail() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .add_query_param("uploadType", "photo")
        .add_query_param("folder", "trips")
        .add_header("acl", "public-read")
        .multipart(photo_form(1920, 1080))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let key = body["key"].as_str().unwrap();
    let thumbnail_key = body["thumbnailKey"].as_str().unwrap();

    assert!(key.starts_with("photos/trips/"));
    assert!(key.ends_with(".png"));
    let stem = key.strip_prefix("photos/trips/").unwrap();
    assert_eq!(thumbnail_key, format!("photos/trips/thumbnail/{}", stem));

    assert!(app.object_exists(key));
    let thumbnail = image::open(app.stored_path(thumbnail_key)).unwrap();
    assert_eq!(thumbnail.dimensions(), (200, 112));
}

#[tokio::test]
async fn test_upload_photo_with_thumbnail_override() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .add_query_param("uploadType", "photo")
        .add_query_param("thumbnailWidth", "64")
        .add_query_param("thumbnailHeight", "64")
        .multipart(photo_form(300, 600))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let thumbnail = image::open(app.stored_path(body["thumbnailKey"].as_str().unwrap())).unwrap();
    assert_eq!(thumbnail.dimensions(), (32, 64));
}

#[tokio::test]
async fn test_upload_with_half_override_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .add_query_param("uploadType", "photo")
        .add_query_param("thumbnailWidth", "64")
        .multipart(photo_form(10, 10))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_generic_file_has_no_thumbnail() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"%PDF-1.4 minimal".to_vec())
            .file_name("report.pdf")
            .mime_type("application/pdf"),
    );
    let response = app
        .client()
        .post("/upload")
        .add_query_param("uploadType", "file")
        .add_query_param("folder", "ignored")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let key = body["key"].as_str().unwrap();
    assert!(key.starts_with("files/"));
    assert!(key.ends_with(".pdf"));
    assert!(body["thumbnailKey"].is_null());
    assert_eq!(app.object_count(), 1);
}

#[tokio::test]
async fn test_upload_without_type_is_rejected_before_storing() {
    let app = setup_test_app().await;

    let response = app.client().post("/upload").multipart(photo_form(10, 10)).await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "INVALID_REQUEST");
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_with_unknown_type_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .add_query_param("uploadType", "audio")
        .multipart(photo_form(10, 10))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_without_file_part_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_text("note", "no file here");
    let response = app
        .client()
        .post("/upload")
        .add_query_param("uploadType", "photo")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_video_derivative_failure_is_partial_success() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(vec![0u8; 2048])
            .file_name("clip.mp4")
            .mime_type("video/mp4"),
    );
    let response = app
        .client()
        .post("/upload")
        .add_query_param("uploadType", "video")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 207);
    let body: Value = response.json();
    let key = body["key"].as_str().unwrap();
    assert!(key.starts_with("videos/"));
    assert!(key.ends_with(".mp4"));
    assert!(body["thumbnailKey"].is_null());
    assert_eq!(body["failedStage"], "generating_derivative");
    assert!(app.object_exists(key));
}

#[tokio::test]
async fn test_presign_existing_and_missing_keys() {
    let app = setup_test_app().await;

    let upload = app
        .client()
        .post("/upload")
        .add_query_param("uploadType", "photo")
        .multipart(photo_form(20, 20))
        .await;
    let key = upload.json::<Value>()["key"].as_str().unwrap().to_string();

    let response = app.client().post("/presignurl").text(key.clone()).await;
    assert_eq!(response.status_code(), 200);
    let url = response.text();
    assert!(url.starts_with("file://"));
    assert!(url.ends_with(&key));

    let response = app
        .client()
        .post("/presignurl")
        .text("photos/missing.png")
        .await;
    assert_eq!(response.status_code(), 502);
    assert_eq!(response.json::<Value>()["code"], "PRESIGN_ERROR");
}

#[tokio::test]
async fn test_delete_object_and_folder() {
    let app = setup_test_app().await;

    let mut keys = Vec::new();
    for _ in 0..2 {
        let response = app
            .client()
            .post("/upload")
            .add_query_param("uploadType", "photo")
            .add_query_param("folder", "album")
            .multipart(photo_form(20, 20))
            .await;
        keys.push(response.json::<Value>()["key"].as_str().unwrap().to_string());
    }
    // Two originals and two thumbnails.
    assert_eq!(app.object_count(), 4);

    let response = app
        .client()
        .delete("/object")
        .add_query_param("key", &keys[0])
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), keys[0]);
    assert!(!app.object_exists(&keys[0]));

    let response = app
        .client()
        .delete("/folder")
        .add_query_param("prefix", "photos/album/")
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "deleted 3 objects");
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_delete_folder_requires_prefix() {
    let app = setup_test_app().await;

    let response = app.client().delete("/folder").add_query_param("prefix", "/").await;

    assert_eq!(response.status_code(), 400);
}
