use crate::{
    error::{AppError, AppResult},
    models::{Rating, Title},
    services::ratings::RatingAggregate,
};

/// Field name reported when a reviewer tries to review the same title twice
pub const DUPLICATE_REVIEW_FIELD: &str = "non_field_errors";
pub const DUPLICATE_REVIEW_MESSAGE: &str = "You have already reviewed this title.";

pub fn duplicate_review() -> AppError {
    AppError::validation(DUPLICATE_REVIEW_FIELD, DUPLICATE_REVIEW_MESSAGE)
}

/// Admits a new review into a title's aggregate.
///
/// Must run inside the same transaction that inserts the review, with the
/// title row locked, so that the uniqueness check and the aggregate update
/// cannot interleave with a concurrent submission. On rejection the title is
/// left untouched.
pub fn admit(title: &mut Title, already_reviewed: bool, rating: Rating) -> AppResult<()> {
    if already_reviewed {
        tracing::debug!(title_id = %title.id, "Rejecting duplicate review");
        return Err(duplicate_review());
    }

    let aggregate = RatingAggregate::of(title).record(rating);
    aggregate.write_to(title);

    tracing::debug!(
        title_id = %title.id,
        average_rating = title.average_rating,
        rating_count = title.rating_count,
        "Title aggregate updated"
    );

    Ok(())
}
