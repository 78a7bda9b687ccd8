// RFP module LLM prompt templates.

/// System prompt for RFP field extraction. Combined with `JSON_ONLY_RULES`.
pub const ANALYSIS_SYSTEM: &str = "You are an expert procurement analyst. \
    You read Requests for Proposals and extract the facts a bidder needs.";

/// Extraction prompt.
/// Replace: {source_label}, {rfp_text}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Extract the key facts from the RFP below (source: {source_label}).

Return a JSON object with these keys:
{
  "title": "official project or solicitation title",
  "client_name": "issuing organization",
  "submission_deadline": "proposal due date and time as written",
  "questions_deadline": "deadline for written questions",
  "pre_bid_meeting": "pre-bid / pre-proposal meeting date",
  "award_date": "anticipated award date",
  "budget_range": "budget, not-to-exceed amount or range",
  "key_requirements": ["mandatory requirement", "..."],
  "deliverables": ["deliverable", "..."],
  "evaluation_criteria": ["criterion and weight", "..."],
  "contact_information": "procurement contact name, email, phone",
  "section_titles": ["proposal section the RFP asks for, in order", "..."]
}

Use "Not mentioned in the document" for any value the RFP does not state.
For section_titles, list the response sections the RFP requires; if it prescribes none,
list the sections a strong proposal for this project would contain.

RFP TEXT:
{rfp_text}"#;
