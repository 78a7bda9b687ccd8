//! Conversion between the Title section's contact block and its text form.
//!
//! Text form is four labelled lines:
//!
//! ```text
//! Submitted by: Acme Engineering
//! Name: Jordan Lee
//! Email: jordan@acme.example
//! Number: 555-0100
//! ```

use crate::models::proposal::{SectionContent, TitleContact};

const SUBMITTED_BY: &str = "Submitted by";
const NAME: &str = "Name";
const EMAIL: &str = "Email";
const NUMBER: &str = "Number";

/// Parses labelled lines into a contact. Unknown lines are ignored, labels are
/// matched case-insensitively and may be wrapped in markdown bold.
pub fn parse_title_text_to_object(text: &str) -> TitleContact {
    let mut contact = TitleContact::default();

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', ' ']);
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = label
            .trim()
            .trim_matches('*')
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let value = value.trim().trim_matches('*').trim().to_string();

        match label.as_str() {
            "submitted by" | "submitted_by" | "company" => contact.submitted_by = value,
            "name" | "contact name" | "contact" => contact.name = value,
            "email" | "e-mail" | "contact email" => contact.email = value,
            "number" | "phone" | "phone number" | "contact number" | "telephone" => {
                contact.number = value
            }
            _ => {}
        }
    }

    contact
}

/// Renders a contact as the four labelled lines.
pub fn format_title_object_to_text(contact: &TitleContact) -> String {
    format!(
        "{SUBMITTED_BY}: {}\n{NAME}: {}\n{EMAIL}: {}\n{NUMBER}: {}",
        contact.submitted_by, contact.name, contact.email, contact.number
    )
}

impl SectionContent {
    /// Text rendering of any section content.
    pub fn to_text(&self) -> String {
        match self {
            SectionContent::Text(text) => text.clone(),
            SectionContent::Contact(contact) => format_title_object_to_text(contact),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            SectionContent::Text(text) => text.trim().is_empty(),
            SectionContent::Contact(c) => {
                [&c.submitted_by, &c.name, &c.email, &c.number]
                    .iter()
                    .all(|v| v.trim().is_empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_round_trip_well_formed_block() {
        let text = "Submitted by: Acme Engineering\nName: Jordan Lee\nEmail: jordan@acme.example\nNumber: 555-0100";
        let contact = parse_title_text_to_object(text);
        assert_eq!(format_title_object_to_text(&contact), text);
    }

    #[test]
    fn test_round_trip_is_whitespace_insensitive() {
        let text = "  Submitted by:   Acme   Engineering \n\nName:Jordan Lee\n Email:  jordan@acme.example\nNumber:\t555-0100  ";
        let contact = parse_title_text_to_object(text);
        assert_eq!(
            squash(&format_title_object_to_text(&contact)),
            squash("Submitted by: Acme Engineering Name: Jordan Lee Email: jordan@acme.example Number: 555-0100")
        );

        let spaced_labels = "Submitted  by: Acme\nName: Jo\nEmail: jo@a.b\nNumber: 555";
        let contact = parse_title_text_to_object(spaced_labels);
        assert_eq!(contact.submitted_by, "Acme");
        assert_eq!(
            squash(&format_title_object_to_text(&contact)),
            squash(spaced_labels)
        );

        let tabbed = parse_title_text_to_object("Submitted\tby: Acme\nPhone   Number: 555");
        assert_eq!(tabbed.submitted_by, "Acme");
        assert_eq!(tabbed.number, "555");
    }

    #[test]
    fn test_parse_accepts_bold_labels_and_bullets() {
        let text = "- **Submitted by:** Acme\n- **Name:** Jo\n- **Email:** jo@acme.example\n- **Phone:** 555";
        let contact = parse_title_text_to_object(text);
        assert_eq!(contact.submitted_by, "Acme");
        assert_eq!(contact.name, "Jo");
        assert_eq!(contact.email, "jo@acme.example");
        assert_eq!(contact.number, "555");
    }

    #[test]
    fn test_email_value_with_colon_free_parse() {
        let contact = parse_title_text_to_object("Email: a@b.c\nNumber: +1 (555) 010-0000");
        assert_eq!(contact.email, "a@b.c");
        assert_eq!(contact.number, "+1 (555) 010-0000");
        assert!(contact.submitted_by.is_empty());
    }

    #[test]
    fn test_contact_content_is_blank_when_all_fields_empty() {
        assert!(SectionContent::Contact(TitleContact::default()).is_blank());
        assert!(!SectionContent::Text("x".to_string()).is_blank());
    }
}
