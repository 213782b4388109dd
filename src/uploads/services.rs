use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;

/// Which profile image slot an upload targets; decides the key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Avatar,
    Cover,
}

impl ImageKind {
    pub fn key_prefix(self) -> &'static str {
        match self {
            ImageKind::Avatar => "avatars",
            ImageKind::Cover => "covers",
        }
    }
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

pub fn object_key(kind: ImageKind, user_id: Uuid, ext: &str) -> String {
    format!("{}/{}/{}.{}", kind.key_prefix(), user_id, Uuid::new_v4(), ext)
}

/// Store the image bytes and return the new object key. The caller persists
/// the key; `replace_old` then removes the previous object, best effort.
pub async fn upload_image(
    st: &AppState,
    user_id: Uuid,
    kind: ImageKind,
    body: Bytes,
    content_type: &str,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(content_type).context("unsupported image type")?;
    let key = object_key(kind, user_id, ext);
    st.storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

/// Delete the replaced object. Failures are logged, not surfaced: the new
/// image is already live and an orphaned object is harmless.
pub async fn delete_old_image(st: &AppState, old_key: Option<&str>) {
    if let Some(key) = old_key {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, key, "failed to delete replaced image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn ext_from_mime_known_types() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("text/html"), None);
    }

    #[test]
    fn object_keys_are_namespaced_per_user_and_kind() {
        let user_id = Uuid::new_v4();
        let key = object_key(ImageKind::Avatar, user_id, "png");
        assert!(key.starts_with(&format!("avatars/{}/", user_id)));
        assert!(key.ends_with(".png"));
        let cover = object_key(ImageKind::Cover, user_id, "jpg");
        assert!(cover.starts_with("covers/"));
    }

    #[tokio::test]
    async fn upload_rejects_non_image_content_type() {
        let state = AppState::fake();
        let err = upload_image(
            &state,
            Uuid::new_v4(),
            ImageKind::Avatar,
            bytes::Bytes::from_static(b"x"),
            "application/pdf",
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("unsupported image type"));
    }

    #[tokio::test]
    async fn upload_returns_key_for_valid_image() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let key = upload_image(
            &state,
            user_id,
            ImageKind::Cover,
            bytes::Bytes::from_static(b"fake-png"),
            "image/png",
        )
        .await
        .unwrap();
        assert!(key.starts_with(&format!("covers/{}/", user_id)));
    }
}
