//! Deterministic section bodies built from content-library data.
//! No LLM calls happen here.

use crate::models::library::{CompanyRow, ProjectReferenceRow, TeamMemberRow};
use crate::models::proposal::TitleContact;
use crate::models::rfp::RfpRow;

/// Title page contact: the company, with the first listed team member as
/// the named contact.
pub fn format_title(company: &CompanyRow, team: &[TeamMemberRow]) -> TitleContact {
    let contact_name = active_in_order(team, None)
        .first()
        .map(|m| m.name.clone())
        .unwrap_or_else(|| company.name.clone());

    TitleContact {
        submitted_by: company.name.clone(),
        name: contact_name,
        email: company.email.clone().unwrap_or_default(),
        number: company.phone.clone().unwrap_or_default(),
    }
}

/// Uses the company's stored letter when present, filling `{client}`,
/// `{rfp_title}` and `{company}`; otherwise a standard letter.
pub fn format_cover_letter(company: &CompanyRow, rfp: &RfpRow) -> String {
    if let Some(letter) = company.cover_letter.as_deref().filter(|l| !l.trim().is_empty()) {
        return letter
            .replace("{client}", &rfp.client_name)
            .replace("{rfp_title}", &rfp.title)
            .replace("{company}", &company.name);
    }

    let mut letter = format!(
        "Dear {},\n\nOn behalf of {}, we are pleased to submit our proposal in response to \"{}\".",
        rfp.client_name, company.name, rfp.title
    );
    if !company.description.trim().is_empty() {
        letter.push_str("\n\n");
        letter.push_str(company.description.trim());
    }
    letter.push_str(&format!(
        "\n\nWe look forward to the opportunity to work with you.\n\nSincerely,\n{}",
        company.name
    ));
    letter
}

pub fn format_experience(company: &CompanyRow) -> String {
    let mut out = format!("## {}\n", company.name);
    if let Some(tagline) = company.tagline.as_deref().filter(|t| !t.is_empty()) {
        out.push_str(&format!("*{tagline}*\n"));
    }
    if !company.description.trim().is_empty() {
        out.push_str(&format!("\n{}\n", company.description.trim()));
    }

    let facts: Vec<String> = [
        company.established.map(|y| format!("- **Established:** {y}")),
        company.employee_count.map(|n| format!("- **Employees:** {n}")),
        company
            .headquarters
            .as_ref()
            .map(|h| format!("- **Headquarters:** {h}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !facts.is_empty() {
        out.push('\n');
        out.push_str(&facts.join("\n"));
        out.push('\n');
    }

    push_list(&mut out, "Services", &company.services);
    push_list(&mut out, "Specializations", &company.specializations);
    out.trim_end().to_string()
}

/// Returns the formatted body and the ids of the members it includes.
/// An empty body means no member matched.
pub fn format_team(team: &[TeamMemberRow], selected_ids: Option<&[String]>) -> (String, Vec<String>) {
    let members = active_in_order(team, selected_ids);
    let ids = members.iter().map(|m| m.member_id.clone()).collect();

    let body = members
        .iter()
        .map(|m| {
            let mut entry = format!("### {}, {}\n", m.name, m.title);
            if let Some(years) = m.experience_years {
                entry.push_str(&format!("{years} years of experience\n"));
            }
            if !m.bio.trim().is_empty() {
                entry.push_str(&format!("\n{}\n", m.bio.trim()));
            }
            if !m.education.is_empty() {
                entry.push_str(&format!("\n**Education:** {}", m.education.join("; ")));
            }
            if !m.certifications.is_empty() {
                entry.push_str(&format!(
                    "\n**Certifications:** {}",
                    m.certifications.join("; ")
                ));
            }
            entry.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    (body, ids)
}

pub fn format_references(
    references: &[ProjectReferenceRow],
    selected_ids: Option<&[String]>,
) -> (String, Vec<String>) {
    let chosen: Vec<&ProjectReferenceRow> = references
        .iter()
        .filter(|r| r.is_active)
        .filter(|r| selected_ids.map_or(true, |ids| ids.contains(&r.reference_id)))
        .collect();
    let ids = chosen.iter().map(|r| r.reference_id.clone()).collect();

    let body = chosen
        .iter()
        .map(|r| {
            let mut entry = format!(
                "### {}\n**Client:** {}\n**Scope:** {}",
                r.project_name, r.organization, r.scope
            );
            if let Some(timeline) = &r.timeline {
                entry.push_str(&format!("\n**Timeline:** {timeline}"));
            }
            if let Some(budget) = &r.budget {
                entry.push_str(&format!("\n**Budget:** {budget}"));
            }
            let contact: Vec<&str> = [&r.contact_name, &r.contact_email, &r.contact_phone]
                .into_iter()
                .filter_map(|v| v.as_deref())
                .filter(|v| !v.is_empty())
                .collect();
            if !contact.is_empty() {
                entry.push_str(&format!("\n**Contact:** {}", contact.join(", ")));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    (body, ids)
}

/// Active members in display order, optionally restricted to `selected_ids`.
pub fn active_in_order<'a>(
    team: &'a [TeamMemberRow],
    selected_ids: Option<&[String]>,
) -> Vec<&'a TeamMemberRow> {
    let mut members: Vec<&TeamMemberRow> = team
        .iter()
        .filter(|m| m.is_active)
        .filter(|m| selected_ids.map_or(true, |ids| ids.contains(&m.member_id)))
        .collect();
    members.sort_by_key(|m| m.display_order);
    members
}

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("\n**{heading}**\n"));
    for item in items {
        out.push_str(&format!("- {item}\n"));
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_title_uses_first_member_as_contact() {
        let team = vec![member("m2", "Sam", 2), member("m1", "Alex", 1)];
        let contact = format_title(&company(), &team);
        assert_eq!(contact.submitted_by, "Acme Engineering");
        assert_eq!(contact.name, "Alex");
        assert_eq!(contact.email, "bids@acme.example");
        assert_eq!(contact.number, "555-0100");
    }

    #[test]
    fn test_cover_letter_substitutes_placeholders() {
        let mut c = company();
        c.cover_letter = Some("To {client}: {company} responds to {rfp_title}.".to_string());
        let letter = format_cover_letter(&c, &rfp());
        assert_eq!(
            letter,
            "To City of Shelbyville: Acme Engineering responds to Main Street Bridge Replacement."
        );
    }

    #[test]
    fn test_default_cover_letter_mentions_client_and_rfp() {
        let letter = format_cover_letter(&company(), &rfp());
        assert!(letter.starts_with("Dear City of Shelbyville,"));
        assert!(letter.contains("Main Street Bridge Replacement"));
        assert!(letter.ends_with("Acme Engineering"));
    }

    #[test]
    fn test_experience_lists_services() {
        let body = format_experience(&company());
        assert!(body.contains("- **Established:** 1998"));
        assert!(body.contains("**Services**\n- Design\n- Inspection"));
    }

    #[test]
    fn test_team_respects_selection_and_order() {
        let team = vec![member("m1", "Alex", 2), member("m2", "Sam", 1), member("m3", "Kim", 3)];
        let selected = vec!["m1".to_string(), "m2".to_string()];
        let (body, ids) = format_team(&team, Some(&selected));
        assert_eq!(ids, vec!["m2", "m1"]);
        assert!(body.starts_with("### Sam, Project Manager"));
        assert!(!body.contains("Kim"));
    }

    #[test]
    fn test_team_skips_inactive_members() {
        let mut inactive = member("m9", "Gone", 0);
        inactive.is_active = false;
        let (body, ids) = format_team(&[inactive], None);
        assert!(body.is_empty());
        assert!(ids.is_empty());
    }

    #[test]
    fn test_references_include_contact_line() {
        let (body, ids) = format_references(&[reference("r1", "Elm Bridge")], None);
        assert_eq!(ids, vec!["r1"]);
        assert!(body.contains("**Contact:** Pat Doe, pat@springfield.gov"));
        assert!(body.contains("**Budget:** $2.4M"));
    }
}
