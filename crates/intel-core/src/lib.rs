//! Core domain model, fixed pools and input validation for Profile Intel.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "intel-core";

/// Upper bound on identifiers accepted in a single batch.
pub const MAX_BATCH_SIZE: usize = 20;

/// Offending lines quoted back to the user before the list is truncated.
pub const MALFORMED_SAMPLE_LIMIT: usize = 3;

pub const PROFILE_DOMAIN: &str = "linkedin.com";

pub const AVATAR_LOCATOR: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

pub const SAMPLE_IDENTIFIERS: [&str; 10] = [
    "https://linkedin.com/in/john-doe",
    "https://linkedin.com/in/mia-khalifa",
    "https://linkedin.com/in/elon-musk",
    "https://linkedin.com/in/taylor-swift",
    "https://linkedin.com/in/michael-scott",
    "https://linkedin.com/in/walter-white",
    "https://linkedin.com/in/sherlock-holmes",
    "https://linkedin.com/in/bruce-wayne",
    "https://linkedin.com/in/tony-stark",
    "https://linkedin.com/in/daenerys-targaryen",
];

pub const SKILL_POOL: [&str; 24] = [
    "React",
    "TypeScript",
    "Node.js",
    "Python",
    "JavaScript",
    "GraphQL",
    "AWS",
    "Docker",
    "Kubernetes",
    "MongoDB",
    "PostgreSQL",
    "Redis",
    "Machine Learning",
    "Data Science",
    "Leadership",
    "Strategic Planning",
    "Product Management",
    "UI/UX Design",
    "Cybersecurity",
    "DevOps",
    "Artificial Intelligence",
    "Blockchain",
    "Cloud Computing",
    "Analytics",
];

pub const TITLE_POOL: [&str; 16] = [
    "Software Engineer",
    "Product Manager",
    "Data Scientist",
    "UX Designer",
    "DevOps Engineer",
    "Marketing Director",
    "CEO",
    "CTO",
    "VP Engineering",
    "Senior Developer",
    "Technical Lead",
    "Security Analyst",
    "Full Stack Developer",
    "Machine Learning Engineer",
    "Business Analyst",
    "Growth Hacker",
];

/// Skills drawn per record.
pub const SKILLS_PER_RECORD: usize = 3;

// `\w` is spelled out so non-ASCII letters are rejected.
static PROFILE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?linkedin\.com/in/[A-Za-z0-9_-]+/?$")
        .expect("profile url pattern is valid")
});

/// A profile URL that passed the shape check. Only [`validate`] builds these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ValidatedIdentifier(String);

impl ValidatedIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segment after `/in/`, without the optional trailing slash.
    pub fn handle(&self) -> &str {
        self.0
            .split_once("/in/")
            .map(|(_, handle)| handle.trim_end_matches('/'))
            .unwrap_or_default()
    }

    /// Human-readable name derived from the handle.
    pub fn display_name(&self) -> String {
        display_name_from_handle(self.handle())
    }

    fn parse(line: &str) -> Option<Self> {
        PROFILE_URL.is_match(line).then(|| Self(line.to_string()))
    }
}

impl std::fmt::Display for ValidatedIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hyphens become spaces; every character that opens a word is upper-cased.
pub fn display_name_from_handle(handle: &str) -> String {
    let mut out = String::with_capacity(handle.len());
    let mut at_word_start = true;
    for c in handle.chars() {
        let c = if c == '-' { ' ' } else { c };
        let is_word = c.is_ascii_alphanumeric() || c == '_';
        if is_word && at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !is_word;
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid LinkedIn URLs detected: {}", malformed_message(.samples, .remaining))]
    MalformedIdentifier { samples: Vec<String>, remaining: usize },
    #[error("Please enter at least one LinkedIn URL")]
    EmptyBatch,
    #[error("Maximum 20 profiles allowed per scraping session")]
    BatchTooLarge { count: usize },
}

fn malformed_message(samples: &[String], remaining: &usize) -> String {
    let ellipsis = if *remaining > 0 { "..." } else { "" };
    format!("{}{ellipsis}", samples.join(", "))
}

/// Whitespace plus a byte-order mark, which editors leave at the start of saved lists.
fn trim_line(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

/// Split, trim and shape-check a multi-line batch. Order is preserved.
pub fn validate(raw_text: &str) -> Result<Vec<ValidatedIdentifier>, ValidationError> {
    let lines: Vec<&str> = raw_text
        .lines()
        .map(trim_line)
        .filter(|line| !line.is_empty())
        .collect();

    let mut identifiers = Vec::with_capacity(lines.len());
    let mut malformed = Vec::new();
    for line in lines {
        match ValidatedIdentifier::parse(line) {
            Some(identifier) => identifiers.push(identifier),
            None => malformed.push(line.to_string()),
        }
    }

    if !malformed.is_empty() {
        let remaining = malformed.len().saturating_sub(MALFORMED_SAMPLE_LIMIT);
        malformed.truncate(MALFORMED_SAMPLE_LIMIT);
        return Err(ValidationError::MalformedIdentifier {
            samples: malformed,
            remaining,
        });
    }
    if identifiers.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    if identifiers.len() > MAX_BATCH_SIZE {
        return Err(ValidationError::BatchTooLarge {
            count: identifiers.len(),
        });
    }
    Ok(identifiers)
}

/// The "load example batch" text: ten known-valid identifiers, one per line.
pub fn sample_batch_text() -> String {
    SAMPLE_IDENTIFIERS.join("\n")
}

/// One synthetic extraction result. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub id: String,
    pub display_name: String,
    pub title: String,
    pub skills: Vec<String>,
    pub source_url: String,
    pub avatar_ref: String,
}

/// Avatar locator seeded by the display name.
pub fn avatar_ref_for(display_name: &str) -> String {
    format!("{AVATAR_LOCATOR}{}", display_name.replace(' ', "%20"))
}

/// Batch progress as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub current_target: String,
    pub completed_count: usize,
    pub total_count: usize,
}

impl ProgressState {
    pub fn started(total_count: usize) -> Self {
        Self {
            current_target: String::new(),
            completed_count: 0,
            total_count,
        }
    }

    /// `round(completed / total * 100)`, or 0 for an empty batch.
    pub fn percent(&self) -> u32 {
        if self.total_count == 0 {
            return 0;
        }
        ((self.completed_count as f64 / self.total_count as f64) * 100.0).round() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.total_count > 0 && self.completed_count == self.total_count
    }
}

/// Aggregate counters shown under the results grid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummary {
    pub record_count: usize,
    pub skills_found: usize,
    pub success_rate: u32,
}

impl ResultsSummary {
    pub fn from_records(records: &[ExtractionRecord]) -> Self {
        Self {
            record_count: records.len(),
            skills_found: records.iter().map(|r| r.skills.len()).sum(),
            success_rate: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> String {
        (0..n)
            .map(|i| format!("https://linkedin.com/in/person-{i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn valid_batch_keeps_length_and_order() {
        let raw = "  https://www.linkedin.com/in/jane-smith/ \n\nhttp://linkedin.com/in/a_b-c\r\nhttps://linkedin.com/in/zed";
        let ids = validate(raw).unwrap();
        let got: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(
            got,
            vec![
                "https://www.linkedin.com/in/jane-smith/",
                "http://linkedin.com/in/a_b-c",
                "https://linkedin.com/in/zed",
            ]
        );
    }

    #[test]
    fn byte_order_mark_is_trimmed() {
        let ids = validate("\u{feff}https://linkedin.com/in/john-doe\nhttps://linkedin.com/in/jane-smith").unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].as_str(), "https://linkedin.com/in/john-doe");
        assert_eq!(ids[0].display_name(), "John Doe");
    }

    #[test]
    fn twenty_lines_is_the_limit() {
        assert_eq!(validate(&lines(20)).unwrap().len(), 20);
        assert_eq!(
            validate(&lines(21)),
            Err(ValidationError::BatchTooLarge { count: 21 })
        );
    }

    #[test]
    fn blank_input_is_an_empty_batch() {
        assert_eq!(validate(""), Err(ValidationError::EmptyBatch));
        assert_eq!(validate("  \n\t\n   "), Err(ValidationError::EmptyBatch));
    }

    #[test]
    fn one_bad_line_rejects_the_whole_batch() {
        let err = validate("https://linkedin.com/in/jane-smith\nhttps://linkedin.com/in/bad url")
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MalformedIdentifier {
                samples: vec!["https://linkedin.com/in/bad url".to_string()],
                remaining: 0,
            }
        );
        assert_eq!(
            err.to_string(),
            "Invalid LinkedIn URLs detected: https://linkedin.com/in/bad url"
        );
    }

    #[test]
    fn malformed_samples_are_truncated_after_three() {
        let raw = "a\nhttps://linkedin.com/in/ok\nb\nc\nd\ne";
        let err = validate(raw).unwrap_err();
        match &err {
            ValidationError::MalformedIdentifier { samples, remaining } => {
                assert_eq!(samples, &vec!["a".to_string(), "b".into(), "c".into()]);
                assert_eq!(*remaining, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.to_string(), "Invalid LinkedIn URLs detected: a, b, c...");
    }

    #[test]
    fn malformed_check_runs_before_size_check() {
        let raw = format!("{}\nnot-a-url", lines(25));
        assert!(matches!(
            validate(&raw),
            Err(ValidationError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn shape_check_rejects_near_misses() {
        for bad in [
            "ftp://linkedin.com/in/john",
            "https://linkedin.org/in/john",
            "https://m.linkedin.com/in/john",
            "https://linkedin.com/company/acme",
            "https://linkedin.com/in/",
            "https://linkedin.com/in/john/posts",
            "https://linkedin.com/in/jöhn",
        ] {
            assert!(validate(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn handle_and_display_name() {
        let ids = validate("https://linkedin.com/in/john-doe/\nhttps://linkedin.com/in/mary_jane-o-neil").unwrap();
        assert_eq!(ids[0].handle(), "john-doe");
        assert_eq!(ids[0].display_name(), "John Doe");
        assert_eq!(ids[1].display_name(), "Mary_jane O Neil");
        assert_eq!(display_name_from_handle("r2-d2"), "R2 D2");
    }

    #[test]
    fn sample_batch_is_valid_and_ordered() {
        let ids = validate(&sample_batch_text()).unwrap();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[0].as_str(), SAMPLE_IDENTIFIERS[0]);
        assert_eq!(ids[9].display_name(), "Daenerys Targaryen");
    }

    #[test]
    fn percent_rounds_and_handles_empty() {
        assert_eq!(ProgressState::default().percent(), 0);
        let p = ProgressState {
            current_target: "x".into(),
            completed_count: 1,
            total_count: 3,
        };
        assert_eq!(p.percent(), 33);
        let p = ProgressState { completed_count: 2, ..p };
        assert_eq!(p.percent(), 67);
        assert!(!p.is_complete());
    }

    #[test]
    fn summary_counts_skills() {
        let record = ExtractionRecord {
            id: "abc".into(),
            display_name: "A".into(),
            title: TITLE_POOL[0].into(),
            skills: vec!["React".into(), "AWS".into(), "Redis".into()],
            source_url: SAMPLE_IDENTIFIERS[0].into(),
            avatar_ref: avatar_ref_for("A"),
        };
        let summary = ResultsSummary::from_records(&[record.clone(), record]);
        assert_eq!(summary.record_count, 2);
        assert_eq!(summary.skills_found, 6);
        assert_eq!(summary.success_rate, 100);
    }

    #[test]
    fn records_serialize_camel_case() {
        let json = serde_json::to_value(ProgressState::started(4)).unwrap();
        assert_eq!(json["totalCount"], 4);
        assert_eq!(json["currentTarget"], "");
    }
}
