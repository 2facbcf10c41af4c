use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FinanceError {
    #[error("invalid input: {field} {reason}")]
    InvalidInput { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, FinanceError>;

impl FinanceError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Rejects NaN, infinities and negative values.
pub(crate) fn ensure_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(FinanceError::invalid(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(FinanceError::invalid(field, format!("must be >= 0, got {value}")));
    }
    Ok(())
}

pub(crate) fn ensure_in_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || !(min..=max).contains(&value) {
        return Err(FinanceError::invalid(
            field,
            format!("must be between {min} and {max}, got {value}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_non_negative_rejects_negative_and_nan() {
        assert!(ensure_non_negative("x", 0.0).is_ok());
        assert!(ensure_non_negative("x", 12.5).is_ok());

        let err = ensure_non_negative("balance", -1.0).expect_err("negative must fail");
        assert!(err.to_string().contains("balance"));
        assert!(ensure_non_negative("x", f64::NAN).is_err());
        assert!(ensure_non_negative("x", f64::INFINITY).is_err());
    }

    #[test]
    fn ensure_in_range_is_inclusive() {
        assert!(ensure_in_range("rate", 0.0, 0.0, 1.0).is_ok());
        assert!(ensure_in_range("rate", 1.0, 0.0, 1.0).is_ok());
        assert!(ensure_in_range("rate", 1.01, 0.0, 1.0).is_err());
        assert!(ensure_in_range("rate", f64::NAN, 0.0, 1.0).is_err());
    }
}
