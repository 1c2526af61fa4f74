// Shared prompt fragments. Each subsystem that calls the model keeps its own
// prompts.rs alongside it; this file holds the cross-cutting pieces.

/// System prompt fragment shared by every structured call.
pub const STRUCTURED_SYSTEM: &str = "You are a precise career assistant. \
    You MUST answer by calling the provided tool exactly once. \
    Every field of the tool input is required; use an empty string or empty list \
    when you have nothing to say. Do NOT invent facts that are not in the provided material.";

/// Instruction appended to prompts that rewrite CV content.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Only rephrase, reorder or trim what the CV already says. \
    Do NOT invent employers, dates, degrees, metrics or skills. \
    Keep every `id` exactly as given; new items you add must have an empty `id`.";

/// Fills `{name}` placeholders in one pass over `template`. Substituted values
/// are never rescanned, and unknown placeholders are left as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match value {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
