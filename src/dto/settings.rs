use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::SettingsPatch;

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub email_verification_enabled: Option<bool>,
    #[validate(url(message = "must be a valid URL"))]
    pub otp_api_url: Option<String>,
    #[validate(range(max = 86400, message = "must be at most 86400"))]
    pub otp_resend_interval_seconds: Option<u32>,
    #[validate(range(min = 1, max = 10000, message = "must be between 1 and 10000"))]
    pub otp_max_per_email_per_hour: Option<u32>,
}

impl From<UpdateSettingsRequest> for SettingsPatch {
    fn from(req: UpdateSettingsRequest) -> Self {
        Self {
            email_verification_enabled: req.email_verification_enabled,
            otp_api_url: req.otp_api_url,
            otp_resend_interval_seconds: req.otp_resend_interval_seconds,
            otp_max_per_email_per_hour: req.otp_max_per_email_per_hour,
        }
    }
}
