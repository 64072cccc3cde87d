use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Review, ReviewPatch},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_reviews(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    let items = state.store.list_reviews_for_product(product_id).await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(meta)))
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    payload.validate()?;
    if state.store.find_product(payload.product_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let review = Review {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        user_name: user.name.clone(),
        product_id: payload.product_id,
        rating: payload.rating,
        comment: payload.comment,
        date: Utc::now(),
    };
    let review = state.store.insert_review(review).await?;

    tracing::info!(
        user_id = %user.user_id,
        product_id = %review.product_id,
        review_id = %review.id,
        "review created"
    );
    Ok(ApiResponse::success(
        "Review created",
        review,
        Some(Meta::empty()),
    ))
}

/// Only the author may edit a review.
pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    payload.validate()?;
    let existing = state.store.find_review(id).await?.ok_or(AppError::NotFound)?;
    if existing.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let patch = ReviewPatch {
        rating: payload.rating,
        comment: payload.comment,
    };
    let review = state.store.update_review(id, patch).await?;
    tracing::info!(user_id = %user.user_id, review_id = %review.id, "review updated");
    Ok(ApiResponse::success(
        "Review updated",
        review,
        Some(Meta::empty()),
    ))
}

/// The author or an admin may delete a review.
pub async fn delete_review(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    let existing = state.store.find_review(id).await?.ok_or(AppError::NotFound)?;
    if !user.can_access(existing.user_id) {
        return Err(AppError::Forbidden);
    }

    state.store.delete_review(id).await?;
    tracing::info!(user_id = %user.user_id, review_id = %id, "review deleted");
    Ok(())
}
