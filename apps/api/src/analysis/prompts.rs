// Prompt constants for position analysis.

pub const SUMMARY_SYSTEM: &str = "You are an experienced technical recruiter. \
    You read job postings and explain, in plain language, what the role really is.";

/// Replace `{job_text}` before sending.
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"Summarize the following job posting.

- positionSummary: 4-6 sentences covering the role, seniority, core responsibilities,
  must-have skills and anything unusual about the team or company.
- companyName: the hiring company's name, or "" if the posting does not say.

JOB POSTING:
{job_text}"#;

pub const INTERSECTION_SYSTEM: &str = "You are a candid career coach. \
    You compare a candidate's CV against a job posting and judge the fit honestly.";

/// Replace `{job_text}` and `{cv_json}` before sending.
pub const INTERSECTION_PROMPT_TEMPLATE: &str = r#"Compare the CV with the job posting.

- opinion: 2-4 sentences on how well the candidate fits.
- rating: an integer from 1 (no fit) to 10 (perfect fit).
- whatIsGood: concrete strengths from the CV that match the posting.
- whatIsMissing: requirements of the posting the CV does not show.

JOB POSTING:
{job_text}

CV (JSON):
{cv_json}"#;
