//! One-time codes for email verification at registration.
//!
//! The table is process-local. Each `issue` runs its check-then-write under
//! the map's per-key lock, and delivery happens only after the bookkeeping
//! is committed, so two concurrent requests for one email cannot both pass
//! the same quota slot.

use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use password_hash::rand_core::{OsRng, RngCore};

use crate::{
    error::{AppError, AppResult},
    models::Settings,
};

pub mod delivery;

pub use delivery::{DeliveryOutcome, HttpOtpSender, OtpSender};

pub const CODE_TTL_MINUTES: i64 = 10;
pub const RATE_WINDOW_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub last_sent_at: DateTime<Utc>,
    pub send_count: u32,
    pub window_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    pub resend_interval_seconds: u32,
    pub max_per_hour: u32,
}

impl From<&Settings> for OtpPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            resend_interval_seconds: settings.otp_resend_interval_seconds,
            max_per_hour: settings.otp_max_per_email_per_hour.max(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct OtpLimiter {
    pending: DashMap<String, PendingOtp>,
}

impl OtpLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fresh code for `email` and returns it, or refuses with
    /// `RateLimited` when the resend interval or the hourly quota forbids it.
    pub fn issue(&self, email: &str, policy: OtpPolicy, now: DateTime<Utc>) -> AppResult<String> {
        let code = generate_code();
        let expires_at = now + Duration::minutes(CODE_TTL_MINUTES);

        match self.pending.entry(email.to_string()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();

                let interval = Duration::seconds(i64::from(policy.resend_interval_seconds));
                let since_last = now - record.last_sent_at;
                if since_last < interval {
                    let remaining_ms = (interval - since_last).num_milliseconds().max(1);
                    let retry_after = (remaining_ms as u64).div_ceil(1000);
                    return Err(AppError::RateLimited {
                        message: "Please wait before requesting another OTP".into(),
                        retry_after_seconds: Some(retry_after),
                    });
                }

                if now - record.window_start >= Duration::minutes(RATE_WINDOW_MINUTES) {
                    record.window_start = now;
                    record.send_count = 0;
                }
                if record.send_count >= policy.max_per_hour {
                    return Err(AppError::RateLimited {
                        message: "OTP request limit reached for this email. Try again later."
                            .into(),
                        retry_after_seconds: None,
                    });
                }

                record.code = code.clone();
                record.expires_at = expires_at;
                record.last_sent_at = now;
                record.send_count += 1;
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingOtp {
                    code: code.clone(),
                    expires_at,
                    last_sent_at: now,
                    send_count: 1,
                    window_start: now,
                });
            }
        }

        Ok(code)
    }

    /// Consumes the pending code when it matches and has not expired.
    pub fn verify(&self, email: &str, code: &str, now: DateTime<Utc>) -> bool {
        self.pending
            .remove_if(email, |_, record| record.code == code && now <= record.expires_at)
            .is_some()
    }

    pub fn pending(&self, email: &str) -> Option<PendingOtp> {
        self.pending.get(email).map(|r| r.value().clone())
    }

    /// Drops records whose code expired and whose rate window has closed.
    pub fn purge_stale(&self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, record| {
            now <= record.expires_at
                || now - record.window_start < Duration::minutes(RATE_WINDOW_MINUTES)
        });
        before.saturating_sub(self.pending.len())
    }
}

fn generate_code() -> String {
    format!("{:06}", 100_000 + OsRng.next_u32() % 900_000)
}
