use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    state::AppState,
    uploads::services::{delete_old_image, ext_from_mime, upload_image, ImageKind},
    users::repo::User,
};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/upload/avatar", post(upload_avatar))
        .route("/upload/cover", post(upload_cover))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB
}

#[instrument(skip(state, current, mp))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    current: CurrentUser,
    mp: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    handle_upload(state, current, mp, ImageKind::Avatar).await
}

#[instrument(skip(state, current, mp))]
pub async fn upload_cover(
    State(state): State<AppState>,
    current: CurrentUser,
    mp: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    handle_upload(state, current, mp, ImageKind::Cover).await
}

async fn handle_upload(
    state: AppState,
    current: CurrentUser,
    mut mp: Multipart,
    kind: ImageKind,
) -> ApiResult<Json<UploadResponse>> {
    // First file field wins; field name is not load-bearing so both
    // "avatar"/"cover" and a generic "file" work.
    let mut file: Option<(Bytes, String)> = None;
    while let Ok(Some(field)) = mp.next_field().await {
        if field.file_name().is_none() && field.content_type().is_none() {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("invalid upload: {e}")))?;
        file = Some((data, content_type));
        break;
    }
    let (body, content_type) = file.ok_or_else(|| ApiError::Validation("no file uploaded".into()))?;
    if body.is_empty() {
        return Err(ApiError::Validation("uploaded file is empty".into()));
    }
    if ext_from_mime(&content_type).is_none() {
        return Err(ApiError::Validation("unsupported image type".into()));
    }

    // Grab the old key before the swap so the replaced object can be removed.
    let old_key = User::find_by_id(&state.db, current.id)
        .await
        .map_err(ApiError::Internal)?
        .and_then(|u| match kind {
            ImageKind::Avatar => u.avatar_key,
            ImageKind::Cover => u.cover_key,
        });

    let key = upload_image(&state, current.id, kind, body, &content_type)
        .await
        .map_err(ApiError::Internal)?;

    match kind {
        ImageKind::Avatar => User::set_avatar_key(&state.db, current.id, &key)
            .await
            .map_err(ApiError::Internal)?,
        ImageKind::Cover => User::set_cover_key(&state.db, current.id, &key)
            .await
            .map_err(ApiError::Internal)?,
    }

    delete_old_image(&state, old_key.as_deref()).await;

    let url = state.storage.object_url(&key);
    info!(user_id = %current.id, ?kind, key, "image uploaded");
    Ok(Json(UploadResponse { url }))
}
