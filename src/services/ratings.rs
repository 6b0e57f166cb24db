use crate::models::{Rating, Title};

/// A title's derived rating fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingAggregate {
    pub average_rating: f64,
    pub rating_count: i32,
}

impl RatingAggregate {
    pub fn of(title: &Title) -> Self {
        Self {
            average_rating: title.average_rating,
            rating_count: title.rating_count,
        }
    }

    /// Folds one new rating into the aggregate.
    ///
    /// The first rating is taken as-is. Every later rating is averaged with the
    /// current average, not with the full history, so older ratings decay by
    /// half at each step. This is the catalog's established rating rule and is
    /// kept deliberately; it is not an arithmetic mean.
    pub fn record(self, rating: Rating) -> Self {
        let rating = f64::from(rating.value());
        let average_rating = if self.rating_count == 0 {
            rating
        } else {
            (self.average_rating + rating) / 2.0
        };

        Self {
            average_rating,
            rating_count: self.rating_count + 1,
        }
    }

    pub fn write_to(self, title: &mut Title) {
        title.average_rating = self.average_rating;
        title.rating_count = self.rating_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(value: i16) -> Rating {
        Rating::try_from(value).unwrap()
    }

    const UNRATED: RatingAggregate = RatingAggregate {
        average_rating: 0.0,
        rating_count: 0,
    };

    #[test]
    fn test_first_rating_is_taken_verbatim() {
        for value in 1..=5 {
            let aggregate = UNRATED.record(rating(value));
            assert_eq!(aggregate.average_rating, f64::from(value));
            assert_eq!(aggregate.rating_count, 1);
        }
    }

    #[test]
    fn test_second_rating_averages_with_current() {
        let aggregate = UNRATED.record(rating(5)).record(rating(3));
        assert_eq!(aggregate.average_rating, 4.0);
        assert_eq!(aggregate.rating_count, 2);
    }

    #[test]
    fn test_is_two_term_average_not_mean() {
        // 5, 1, 1 -> 5 -> 3 -> 2; the arithmetic mean would be 7/3
        let aggregate = UNRATED
            .record(rating(5))
            .record(rating(1))
            .record(rating(1));
        assert_eq!(aggregate.average_rating, 2.0);
        assert_eq!(aggregate.rating_count, 3);
    }

    #[test]
    fn test_fractional_average_is_kept() {
        let aggregate = UNRATED.record(rating(4)).record(rating(1));
        assert_eq!(aggregate.average_rating, 2.5);
    }

    #[test]
    fn test_stale_average_on_zero_count_is_ignored() {
        let start = RatingAggregate {
            average_rating: 3.0,
            rating_count: 0,
        };
        assert_eq!(start.record(rating(1)).average_rating, 1.0);
    }
}
