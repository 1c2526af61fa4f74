//! Request validation. Runs before any cache lookup or model call so that bad
//! input surfaces as `AppError::Validation`, never as an upstream failure.

use crate::cv::CvDocument;
use crate::errors::AppError;

pub const MAX_JOB_TEXT_CHARS: usize = 50_000;

pub fn validate_job_text(job_text: &str) -> Result<(), AppError> {
    if job_text.trim().is_empty() {
        return Err(AppError::Validation("job_text cannot be empty".to_string()));
    }
    let chars = job_text.chars().count();
    if chars > MAX_JOB_TEXT_CHARS {
        return Err(AppError::Validation(format!(
            "job_text is {chars} characters; the limit is {MAX_JOB_TEXT_CHARS}"
        )));
    }
    Ok(())
}

pub fn validate_cv(cv: &CvDocument) -> Result<(), AppError> {
    if cv.is_empty() {
        return Err(AppError::Validation(
            "CV has no sections in either column".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::Section;

    #[test]
    fn test_blank_job_text_is_rejected() {
        assert!(matches!(
            validate_job_text("  \n "),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_oversized_job_text_is_rejected() {
        let text = "a".repeat(MAX_JOB_TEXT_CHARS + 1);
        assert!(matches!(validate_job_text(&text), Err(AppError::Validation(_))));
        assert!(validate_job_text(&text[..MAX_JOB_TEXT_CHARS]).is_ok());
    }

    #[test]
    fn test_cv_needs_a_section() {
        assert!(validate_cv(&CvDocument::default()).is_err());
        let cv = CvDocument {
            main: vec![],
            side: vec![Section::default()],
        };
        assert!(validate_cv(&cv).is_ok());
    }
}
