// Prompt constants for CV personalization, story ranking and cover letters.

use crate::llm_client::prompts::{render, GROUNDING_INSTRUCTION};

pub const PERSONALIZE_SYSTEM: &str = "You are an expert CV writer. \
    You tailor an existing CV to one specific job without changing the facts.";

/// Replace `{grounding_instruction}`, `{position_summary}`, `{job_text}` and `{cv_json}`.
pub const PERSONALIZE_PROMPT_TEMPLATE: &str = r#"Rewrite the CV below for this job.

{grounding_instruction}

- Keep both columns and the section order unless reordering clearly helps this job.
- Reword bullet points and paragraphs to foreground what the job asks for.
- Return the complete CV, including sections you did not change.

POSITION SUMMARY:
{position_summary}

JOB POSTING:
{job_text}

CV (JSON):
{cv_json}"#;

pub const RANKING_SYSTEM: &str = "You are a hiring manager. \
    You judge which of a candidate's stories best demonstrates fit for a role.";

/// Replace `{position_summary}`, `{job_text}` and `{stories_json}`.
pub const RANKING_PROMPT_TEMPLATE: &str = r#"Rank every story by how strongly it supports this application.

- storyId: the story's id, exactly as given.
- relevance: integer 1 (irrelevant) to 10 (decisive).
- reason: one sentence.

POSITION SUMMARY:
{position_summary}

JOB POSTING:
{job_text}

STORIES (JSON):
{stories_json}"#;

pub const LETTER_SYSTEM: &str = "You are a candidate writing a warm, specific, \
    one-page cover letter. You never exaggerate.";

/// Replace `{position_summary}`, `{company_name}`, `{job_text}`, `{stories_json}` and `{cv_json}`.
pub const LETTER_PROMPT_TEMPLATE: &str = r#"Write a cover letter for this application.

- subject: an email subject line.
- body: the letter, 250-400 words, built around the stories below.

COMPANY: {company_name}

POSITION SUMMARY:
{position_summary}

JOB POSTING:
{job_text}

STORIES TO USE (JSON):
{stories_json}

CV (JSON):
{cv_json}"#;

pub fn personalize_prompt(position_summary: &str, job_text: &str, cv_json: &str) -> String {
    render(
        PERSONALIZE_PROMPT_TEMPLATE,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("position_summary", position_summary),
            ("job_text", job_text),
            ("cv_json", cv_json),
        ],
    )
}
