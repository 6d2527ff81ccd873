pub mod series;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::DocumentDescriptor;
use crate::job::{JobOutcome, JobState};
use crate::service::ExtractionResult;

pub use series::{BusinessCodeTable, UNCLASSIFIED};

/// The ten canonical output fields, in column order.
pub const CANONICAL_FIELDS: &[&str] = &[
    "SiteOnForm",
    "NameOnForm",
    "LogoOnForm",
    "EmailOnForm",
    "PhoneOnForm",
    "AddressOnForm",
    "SignatureOnForm",
    "LOB",
    "State",
    "Language",
];

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// Normalized output row for one document. Exactly one exists per discovered
/// document, whatever the job outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub document: String,
    pub site_on_form: String,
    pub name_on_form: String,
    pub logo_on_form: String,
    pub email_on_form: String,
    pub phone_on_form: String,
    pub address_on_form: String,
    pub signature_on_form: String,
    pub lob: String,
    pub state: String,
    pub language: String,
    pub s3_uri: String,
    pub processing_status: String,
    pub error_message: String,
    /// Terminal job state backing the run summary; not an export column.
    pub final_state: JobState,
}

impl CanonicalRecord {
    /// Error row with empty canonical fields.
    #[must_use]
    pub fn error(document: &DocumentDescriptor, state: JobState, message: String) -> Self {
        Self {
            document: document.filename.clone(),
            site_on_form: String::new(),
            name_on_form: String::new(),
            logo_on_form: String::new(),
            email_on_form: String::new(),
            phone_on_form: String::new(),
            address_on_form: String::new(),
            signature_on_form: String::new(),
            lob: String::new(),
            state: String::new(),
            language: String::new(),
            s3_uri: document.source_uri.clone(),
            processing_status: STATUS_ERROR.to_string(),
            error_message: message,
            final_state: state,
        }
    }

    /// Values in the 14-column export order.
    #[must_use]
    pub fn as_row(&self) -> [&str; 14] {
        [
            &self.document,
            &self.site_on_form,
            &self.name_on_form,
            &self.logo_on_form,
            &self.email_on_form,
            &self.phone_on_form,
            &self.address_on_form,
            &self.signature_on_form,
            &self.lob,
            &self.state,
            &self.language,
            &self.s3_uri,
            &self.processing_status,
            &self.error_message,
        ]
    }
}

/// One jurisdiction override. Rules are consulted in order; the first whose
/// name marker matches an extracted organization name, or whose logo marker
/// matches an extracted logo, fixes the state code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerRule {
    pub name_marker: String,
    #[serde(default)]
    pub logo_marker: Option<String>,
    pub state_code: String,
}

impl IssuerRule {
    fn matches(&self, names: &[String], logos: &[String]) -> bool {
        let marker = self.name_marker.to_lowercase();
        if names.iter().any(|n| n.to_lowercase().contains(&marker)) {
            return true;
        }
        self.logo_marker.as_ref().is_some_and(|logo| {
            let logo = logo.to_lowercase();
            logos.iter().any(|l| l.to_lowercase().contains(&logo))
        })
    }
}

/// Built-in override order: Indiana Farm Bureau first, East Street second.
#[must_use]
pub fn default_issuer_rules() -> Vec<IssuerRule> {
    vec![
        IssuerRule {
            name_marker: "Indiana Farm Bureau".to_string(),
            logo_marker: Some("IFB".to_string()),
            state_code: "IN".to_string(),
        },
        IssuerRule {
            name_marker: "East Street Insurance".to_string(),
            logo_marker: Some("EastStreet".to_string()),
            state_code: "OH".to_string(),
        },
    ]
}

/// Pure mapping from raw extraction output to [`CanonicalRecord`]s.
pub struct FieldNormalizer {
    table: BusinessCodeTable,
    issuer_rules: Vec<IssuerRule>,
    street_or_pobox: Regex,
}

impl FieldNormalizer {
    #[must_use]
    pub fn new(table: BusinessCodeTable, issuer_rules: Vec<IssuerRule>) -> Self {
        Self {
            table,
            issuer_rules,
            // A deliverable address starts with a street number or carries a
            // PO Box token somewhere.
            street_or_pobox: Regex::new(r"(?i)(^\s*\d+\s+\S)|(\bP\.?\s*O\.?\s*Box\b)")
                .expect("address regex must compile"),
        }
    }

    #[must_use]
    pub fn with_bundled_table() -> Self {
        Self::new(BusinessCodeTable::bundled(), default_issuer_rules())
    }

    /// Convert a finished job into its output row. Infallible: non-success
    /// outcomes become error rows.
    #[must_use]
    pub fn record(&self, outcome: &JobOutcome) -> CanonicalRecord {
        match (&outcome.state, &outcome.result) {
            (JobState::Succeeded, Some(result)) => self.record_from_result(outcome, result),
            (JobState::Succeeded, None) => CanonicalRecord::error(
                &outcome.document,
                JobState::Succeeded,
                "service returned success without a result payload".to_string(),
            ),
            (state, _) => CanonicalRecord::error(
                &outcome.document,
                *state,
                outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("job ended in state {state}")),
            ),
        }
    }

    fn record_from_result(&self, outcome: &JobOutcome, result: &ExtractionResult) -> CanonicalRecord {
        let names = values(result, "NameOnForm");
        let logos = values(result, "LogoOnForm");

        CanonicalRecord {
            document: outcome.document.filename.clone(),
            site_on_form: join(&values(result, "SiteOnForm"), ", "),
            name_on_form: join(&names, ", "),
            // Logo identifiers join without spaces, unlike every other list.
            logo_on_form: join(&logos, ","),
            email_on_form: join(&values(result, "EmailOnForm"), ", "),
            phone_on_form: join(&values(result, "PhoneOnForm"), ", "),
            address_on_form: self.normalize_addresses(&values(result, "AddressOnForm")),
            signature_on_form: join(&values(result, "SignatureOnForm"), ", "),
            lob: self.normalize_lob(result),
            state: self.resolve_state(result, &names, &logos),
            language: join(&values(result, "Language"), ", "),
            s3_uri: outcome.document.source_uri.clone(),
            processing_status: STATUS_SUCCESS.to_string(),
            error_message: String::new(),
            final_state: JobState::Succeeded,
        }
    }

    fn normalize_lob(&self, result: &ExtractionResult) -> String {
        let identifiers = values(result, "LOB");
        let Some(identifier) = identifiers.first() else {
            return String::new();
        };
        self.table.classify(identifier)
    }

    /// Apply the bracket rule: one address stays verbatim, several are each
    /// wrapped. Fragments with no street number or PO Box are dropped.
    fn normalize_addresses(&self, raw: &[String]) -> String {
        let deliverable: Vec<&String> = raw
            .iter()
            .filter(|a| self.street_or_pobox.is_match(a))
            .collect();

        match deliverable.as_slice() {
            [] => String::new(),
            [single] => (*single).clone(),
            many => many
                .iter()
                .map(|a| format!("[{a}]"))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn resolve_state(&self, result: &ExtractionResult, names: &[String], logos: &[String]) -> String {
        for rule in &self.issuer_rules {
            if rule.matches(names, logos) {
                return rule.state_code.clone();
            }
        }
        join(&values(result, "State"), ", ")
    }
}

/// Cleaned values for one field: whitespace collapsed, empties dropped.
fn values(result: &ExtractionResult, field: &str) -> Vec<String> {
    result
        .get(field)
        .map(|value| {
            value
                .values()
                .into_iter()
                .map(clean)
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn clean(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn join(parts: &[String], separator: &str) -> String {
    parts.join(separator)
}
