// Shared prompt fragments.
// Each stage's template lives in generation::prompts; this file holds the
// cross-cutting pieces every structured-output template embeds.

/// Appended to every template whose stage expects structured output.
pub const JSON_OUTPUT_INSTRUCTION: &str = "\
    OUTPUT FORMAT: Respond with a single JSON object inside one ```json code block. \
    Do NOT include explanations, apologies or any text outside the code block. \
    Use exactly the field names shown above; do not add or rename fields.";

/// Appended to free-text templates (the cover letter).
pub const PLAIN_TEXT_INSTRUCTION: &str = "\
    OUTPUT FORMAT: Respond with the letter body only, as plain paragraphs separated \
    by blank lines. No salutation block, no signature, no markdown.";

/// Horizontal rule used around injected feedback and humanization blocks.
pub const SEPARATOR: &str = "================================================================================";
