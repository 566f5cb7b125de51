//! Validation utilities

use chrono::NaiveDate;

use crate::types::*;

/// Validate that a period's start does not fall after its end
pub fn validate_period(start: NaiveDate, end: NaiveDate) -> ReconResult<()> {
    if start > end {
        Err(ReconError::Validation(format!(
            "Period start {} falls after period end {}",
            start, end
        )))
    } else {
        Ok(())
    }
}

/// Validate that a required identifier or field is non-empty
pub fn validate_non_empty(field: &str, value: &str) -> ReconResult<()> {
    if value.trim().is_empty() {
        Err(ReconError::Validation(format!("{} cannot be empty", field)))
    } else {
        Ok(())
    }
}

/// Validate a transaction or adjustment description
pub fn validate_description(description: &str) -> ReconResult<()> {
    validate_non_empty("Description", description)?;

    if description.len() > 500 {
        return Err(ReconError::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}
