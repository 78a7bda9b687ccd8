use crate::models::proposal::SectionMap;

/// One `#` header per section, in stored order.
pub fn render_markdown(sections: &SectionMap) -> String {
    let mut out = String::new();
    for (name, record) in sections {
        out.push_str(&format!("# {name}\n\n"));
        let body = record.content.to_text();
        let body = body.trim();
        if !body.is_empty() {
            out.push_str(body);
            out.push_str("\n\n");
        }
    }
    out.trim_end().to_string() + "\n"
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::proposal::{SectionContent, SectionRecord, SectionType, TitleContact};

    fn record(content: SectionContent) -> SectionRecord {
        SectionRecord {
            content,
            section_type: SectionType::Custom,
            last_modified: Utc::now(),
            selected_ids: None,
        }
    }

    #[test]
    fn test_sections_render_in_order_with_contact_block() {
        let mut sections = SectionMap::new();
        sections.insert(
            "Title".to_string(),
            record(SectionContent::Contact(TitleContact {
                submitted_by: "Acme".to_string(),
                name: "Jo".to_string(),
                email: "jo@acme.example".to_string(),
                number: "555".to_string(),
            })),
        );
        sections.insert(
            "Budget".to_string(),
            record(SectionContent::Text("| Item | Cost |\n|---|---|".to_string())),
        );
        sections.insert("Notes".to_string(), record(SectionContent::Text("  ".to_string())));

        let md = render_markdown(&sections);
        assert_eq!(
            md,
            "# Title\n\nSubmitted by: Acme\nName: Jo\nEmail: jo@acme.example\nNumber: 555\n\n\
             # Budget\n\n| Item | Cost |\n|---|---|\n\n# Notes\n"
        );
    }
}
