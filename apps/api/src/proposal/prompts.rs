// Proposal module LLM prompt templates.

/// System prompt for the 6-way section classifier.
pub const CLASSIFIER_SYSTEM: &str = "You classify proposal section titles for an RFP response tool. \
    Answer with exactly one lowercase label and nothing else.";

/// Classifier prompt. Replace `{title}` before sending.
pub const CLASSIFIER_PROMPT_TEMPLATE: &str = r#"Which content-library category should supply the proposal section titled "{title}"?

Labels:
- title: the title page / submitter contact block
- cover-letter: the letter introducing the proposal
- experience: company background, firm qualifications, past performance, capabilities
- team: key personnel, staff, project team, resumes
- references: client references, testimonials
- none: anything else (approach, budget, timeline, scope, requirements, ...)

Answer with one label only."#;

/// System prompt for batched section generation.
pub const SECTIONS_SYSTEM: &str = "You are an expert proposal writer responding to a public-sector \
    or commercial RFP. You write persuasive, specific, factual proposal sections grounded in \
    the RFP text. Never invent budget figures or dates that contradict the RFP.";

/// Batched section prompt.
/// Replace: {section_keys}, {guidelines}, {rfp_summary}, {rfp_text}
pub const SECTIONS_PROMPT_TEMPLATE: &str = r#"Write the following proposal sections for the RFP below.

Return a JSON object whose keys are EXACTLY these section names (same spelling, no extra keys):
{section_keys}

Each value is the section body as a markdown string. Do not repeat the section name as a header inside the value.
If the RFP gives no information for a section, use the value "Not available in the RFP document".

SECTION GUIDELINES:
{guidelines}

RFP SUMMARY:
{rfp_summary}

RFP TEXT:
{rfp_text}"#;

pub const BUDGET_GUIDELINE: &str = "Present as a markdown table with columns | Item | Description | Cost |, \
    followed by a bold total row. Use only amounts consistent with the RFP budget range.";

pub const TIMELINE_GUIDELINE: &str = "Present as a markdown table with columns | Phase | Activities | Duration |, \
    aligned with the RFP deadlines.";

pub const REQUIREMENTS_GUIDELINE: &str = "Use a bulleted list with one requirement per bullet, \
    each followed by how we meet it. Group related bullets under bold sub-headers.";

pub const TITLE_GUIDELINE: &str = "Return exactly four lines: \
    'Submitted by: <company>', 'Name: <contact person>', 'Email: <email>', 'Number: <phone>'. \
    Take the values from the RFP contact information; leave a value empty if absent.";

pub const PROSE_GUIDELINE: &str = "Two to four paragraphs of persuasive prose tailored to the client's stated needs.";
