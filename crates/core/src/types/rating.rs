//! Product review ratings.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned for ratings outside `1..=5`.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between 1 and 5 (got {0})")]
pub struct RatingError(pub i64);

/// A star rating from 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i16")]
pub struct Rating(i16);

impl Rating {
    /// Lowest allowed rating.
    pub const MIN: i16 = 1;
    /// Highest allowed rating.
    pub const MAX: i16 = 5;

    /// Create a rating.
    ///
    /// # Errors
    ///
    /// Returns `RatingError` if `value` is outside `1..=5`.
    pub fn new(value: i64) -> Result<Self, RatingError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            #[allow(clippy::cast_possible_truncation)] // range-checked above
            Ok(Self(value as i16))
        } else {
            Err(RatingError(value))
        }
    }

    /// The rating value.
    #[must_use]
    pub const fn value(self) -> i16 {
        self.0
    }

    /// Filled and empty stars for display, e.g. `★★★☆☆`.
    #[must_use]
    pub fn stars(self) -> String {
        let filled = usize::try_from(self.0).unwrap_or(0);
        let empty = usize::try_from(Self::MAX - self.0).unwrap_or(0);
        format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
    }
}

impl TryFrom<i64> for Rating {
    type Error = RatingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i16 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Rating {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i16 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Rating {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i16 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(i64::from(raw))?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Rating {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i16 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(1).unwrap().value(), 1);
        assert_eq!(Rating::new(5).unwrap().value(), 5);
    }

    #[test]
    fn test_stars() {
        assert_eq!(Rating::new(3).unwrap().stars(), "★★★☆☆");
    }

    #[test]
    fn test_json_rejects_out_of_range() {
        assert!(serde_json::from_str::<Rating>("7").is_err());
        assert_eq!(serde_json::from_str::<Rating>("4").unwrap().value(), 4);
    }
}
