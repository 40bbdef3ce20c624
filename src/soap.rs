//! Tolerant line-oriented extraction of the four SOAP sections from
//! free-form generated text.

use std::sync::OnceLock;

use regex::Regex;

/// Extracted section bodies, empty string for unmatched sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoapSections {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

fn section_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?mi)^\s*([soap])\s*:\s*(.*)$").expect("section pattern is a valid regex")
    })
}

/// Scan `text` line by line for `S:` / `O:` / `A:` / `P:` headings
/// (case-insensitive, leading whitespace allowed). The last occurrence of a
/// letter wins. Malformed or empty input yields all-empty sections.
pub fn parse_soap(text: &str) -> SoapSections {
    let mut sections = SoapSections::default();

    for captures in section_pattern().captures_iter(text) {
        let value = captures
            .get(2)
            .map(|body| body.as_str().trim())
            .unwrap_or_default()
            .to_string();

        match captures[1].to_ascii_uppercase().as_str() {
            "S" => sections.subjective = value,
            "O" => sections.objective = value,
            "A" => sections.assessment = value,
            "P" => sections.plan = value,
            _ => {}
        }
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_note() {
        let sections =
            parse_soap("S: chest pain\nO: none reported\nA: likely angina\nP: order ECG");
        assert_eq!(sections.subjective, "chest pain");
        assert_eq!(sections.objective, "none reported");
        assert_eq!(sections.assessment, "likely angina");
        assert_eq!(sections.plan, "order ECG");
    }

    #[test]
    fn last_occurrence_wins_on_duplicates() {
        let sections = parse_soap("S: first\nS: second");
        assert_eq!(sections.subjective, "second");
    }

    #[test]
    fn empty_input_yields_empty_sections() {
        assert_eq!(parse_soap(""), SoapSections::default());
    }

    #[test]
    fn unheaded_text_yields_empty_sections() {
        let sections = parse_soap("The patient reports chest pain.\nNo labs were drawn.");
        assert_eq!(sections, SoapSections::default());
    }

    #[test]
    fn tolerates_whitespace_and_case() {
        let sections = parse_soap("  s : mild headache\n\tO:afebrile");
        assert_eq!(sections.subjective, "mild headache");
        assert_eq!(sections.objective, "afebrile");
    }

    #[test]
    fn heading_mid_line_is_not_a_section() {
        let sections = parse_soap("Plan is S: not a heading here");
        assert_eq!(sections.subjective, "");
    }
}
