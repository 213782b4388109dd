use serde::Deserialize;

/// Partial update of the caller's own record. A password change requires the
/// current password alongside the new one.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}
