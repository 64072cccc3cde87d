use chrono::{Duration, TimeZone, Utc};
use noir_storefront::{
    error::AppError,
    otp::{OtpLimiter, OtpPolicy, delivery::classify},
};
use serde_json::json;

const EMAIL: &str = "vera@example.com";

fn policy(interval: u32, max: u32) -> OtpPolicy {
    OtpPolicy {
        resend_interval_seconds: interval,
        max_per_hour: max,
    }
}

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn codes_are_six_digits() {
    let limiter = OtpLimiter::new();
    let code = limiter.issue(EMAIL, policy(0, 5), start()).unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn resend_inside_interval_reports_remaining_seconds() {
    let limiter = OtpLimiter::new();
    let t0 = start();
    limiter.issue(EMAIL, policy(60, 5), t0).unwrap();

    let err = limiter
        .issue(EMAIL, policy(60, 5), t0 + Duration::milliseconds(20_500))
        .unwrap_err();
    match err {
        AppError::RateLimited {
            retry_after_seconds,
            ..
        } => assert_eq!(retry_after_seconds, Some(40)),
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(
        limiter
            .issue(EMAIL, policy(60, 5), t0 + Duration::seconds(60))
            .is_ok()
    );
}

#[test]
fn hourly_quota_blocks_the_extra_request() {
    let limiter = OtpLimiter::new();
    let t0 = start();
    for i in 0..3 {
        limiter
            .issue(EMAIL, policy(0, 3), t0 + Duration::minutes(i))
            .unwrap();
    }

    let err = limiter
        .issue(EMAIL, policy(0, 3), t0 + Duration::minutes(10))
        .unwrap_err();
    match err {
        AppError::RateLimited {
            retry_after_seconds,
            ..
        } => assert_eq!(retry_after_seconds, None),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(limiter.pending(EMAIL).unwrap().send_count, 3);

    // Another address has its own quota.
    assert!(
        limiter
            .issue("other@example.com", policy(0, 3), t0 + Duration::minutes(10))
            .is_ok()
    );
}

#[test]
fn window_resets_after_an_hour() {
    let limiter = OtpLimiter::new();
    let t0 = start();
    limiter.issue(EMAIL, policy(0, 1), t0).unwrap();
    assert!(
        limiter
            .issue(EMAIL, policy(0, 1), t0 + Duration::minutes(59))
            .is_err()
    );

    limiter
        .issue(EMAIL, policy(0, 1), t0 + Duration::minutes(60))
        .unwrap();
    let record = limiter.pending(EMAIL).unwrap();
    assert_eq!(record.send_count, 1);
    assert_eq!(record.window_start, t0 + Duration::minutes(60));
}

#[test]
fn refused_request_leaves_record_untouched() {
    let limiter = OtpLimiter::new();
    let t0 = start();
    limiter.issue(EMAIL, policy(60, 5), t0).unwrap();
    let before = limiter.pending(EMAIL).unwrap();

    let _ = limiter.issue(EMAIL, policy(60, 5), t0 + Duration::seconds(5));
    assert_eq!(limiter.pending(EMAIL).unwrap(), before);
}

#[test]
fn verify_consumes_matching_unexpired_code() {
    let limiter = OtpLimiter::new();
    let t0 = start();
    let code = limiter.issue(EMAIL, policy(0, 5), t0).unwrap();

    assert!(!limiter.verify(EMAIL, "not-it", t0));
    assert!(limiter.verify(EMAIL, &code, t0 + Duration::minutes(9)));
    assert!(!limiter.verify(EMAIL, &code, t0 + Duration::minutes(9)));
}

#[test]
fn expired_code_does_not_verify() {
    let limiter = OtpLimiter::new();
    let t0 = start();
    let code = limiter.issue(EMAIL, policy(0, 5), t0).unwrap();
    assert!(!limiter.verify(EMAIL, &code, t0 + Duration::minutes(11)));
}

#[test]
fn purge_drops_only_stale_records() {
    let limiter = OtpLimiter::new();
    let t0 = start();
    limiter.issue("old@example.com", policy(0, 5), t0).unwrap();
    limiter
        .issue("new@example.com", policy(0, 5), t0 + Duration::minutes(55))
        .unwrap();

    let purged = limiter.purge_stale(t0 + Duration::minutes(61));
    assert_eq!(purged, 1);
    assert!(limiter.pending("old@example.com").is_none());
    assert!(limiter.pending("new@example.com").is_some());
}

#[test]
fn delivery_answers_are_classified() {
    use noir_storefront::otp::DeliveryOutcome;

    assert_eq!(
        classify(&json!({ "message": "OTP sent successfully" })),
        DeliveryOutcome::Confirmed
    );
    assert_eq!(
        classify(&json!({ "status": "success" })),
        DeliveryOutcome::Confirmed
    );
    assert_eq!(
        classify(&json!({ "status": "queued" })),
        DeliveryOutcome::Accepted
    );
}
