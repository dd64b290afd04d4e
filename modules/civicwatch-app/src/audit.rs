// AI audit of a report before it is accepted.
//
// Two gates, both must pass: the address reads like a real place, and the
// photo shows the described problem. Any transport or parse failure becomes a
// fail-closed "technical anomaly" verdict; nothing here returns an error.

use std::sync::{Arc, LazyLock};

use ai_client::{strip_code_blocks, GenerativeModel, InlineImage, StructuredOutput};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use civicwatch_common::{Severity, DEFAULT_CATEGORY, DEFAULT_TITLE};

pub const AUDIT_SYSTEM_PROMPT: &str = "\
You are the intake auditor for a municipal issue-reporting service. \
Citizens submit a photo, a short description and an address. Apply two strict gates.

GATE 1 - ADDRESS: address_valid is true only if the address names a real street, \
road, landmark, neighbourhood or locality (for example \"MG Road, Pune\"). \
Vague text (\"near my house\", \"somewhere\"), gibberish, or obviously fabricated \
places fail.

GATE 2 - EVIDENCE: image_matches_description is true only if the photo visibly \
shows the kind of civic problem described (pothole, garbage, broken streetlight, \
water leak, damaged infrastructure...). Unrelated photos, selfies, screenshots \
and stock images fail.

Set confidence_level to high, medium or low. In reason, explain the decision in \
one or two sentences addressed to the citizen. Copy the address as understood into \
address.

When both gates pass, fill category, severity (Low, Medium, High or Critical) and a \
short title, and also write issue_analysis in the form \
\"CATEGORY: <category> SEVERITY: <severity> TITLE: <title>\" followed by a one-line \
assessment. Respond with JSON only.";

const TECHNICAL_ANOMALY_REASON: &str =
    "We could not verify this report due to a technical anomaly. Please try again.";

// =============================================================================
// Verdict
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl Confidence {
    fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.contains("high") {
            Confidence::High
        } else if label.contains("medium") || label.contains("moderate") {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

fn lenient_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Confidence, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => Confidence::from_label(&s),
        Some(serde_json::Value::Number(n)) => match n.as_f64().unwrap_or(0.0) {
            x if x >= 0.75 => Confidence::High,
            x if x >= 0.4 => Confidence::Medium,
            _ => Confidence::Low,
        },
        _ => Confidence::Low,
    })
}

/// Structured answer of the audit call. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AuditVerdict {
    /// The address refers to a real, specific place.
    pub address_valid: bool,
    /// The photo visibly shows the described issue.
    pub image_matches_description: bool,
    #[serde(default, deserialize_with = "lenient_confidence")]
    #[schemars(with = "Confidence")]
    pub confidence_level: Confidence,
    /// Free text carrying CATEGORY:, SEVERITY: and TITLE: labels.
    #[serde(default)]
    pub issue_analysis: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl AuditVerdict {
    /// Fail-closed verdict used whenever the model cannot be reached or understood.
    pub fn technical_anomaly() -> Self {
        Self {
            address_valid: false,
            image_matches_description: false,
            confidence_level: Confidence::Low,
            issue_analysis: String::new(),
            address: String::new(),
            reason: TECHNICAL_ANOMALY_REASON.to_string(),
            category: None,
            severity: None,
            title: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.address_valid && self.image_matches_description
    }

    /// Reason shown to the citizen when a gate fails.
    pub fn rejection_reason(&self) -> String {
        if !self.reason.trim().is_empty() {
            return self.reason.clone();
        }
        match (self.address_valid, self.image_matches_description) {
            (false, false) => "The address could not be verified and the photo does not show the described issue.".to_string(),
            (false, true) => "The address could not be verified. Please enter a specific street or locality.".to_string(),
            (true, false) => "The photo does not appear to show the described issue.".to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Parse raw model output, tolerating a code fence or prose around the JSON object.
pub fn parse_verdict(raw: &str) -> AuditVerdict {
    let body = strip_code_blocks(raw);
    if let Ok(verdict) = serde_json::from_str::<AuditVerdict>(body) {
        return verdict;
    }

    let embedded = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end]).ok(),
        _ => None,
    };
    embedded.unwrap_or_else(|| {
        warn!(raw_len = raw.len(), "Audit response was not a valid verdict");
        AuditVerdict::technical_anomaly()
    })
}

// =============================================================================
// Classification
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct IssueClassification {
    pub category: String,
    pub severity: Severity,
    pub title: String,
}

static RE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(CATEGORY|SEVERITY|TITLE)\s*:").unwrap());

/// Value following `label:` in free text, up to the next label or line break.
fn scan_label(text: &str, label: &str) -> Option<String> {
    let labels: Vec<(String, usize, usize)> = RE_LABEL
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().to_ascii_uppercase();
            Some((name, whole.start(), whole.end()))
        })
        .collect();

    let idx = labels.iter().position(|(name, _, _)| name == label)?;
    let value_start = labels[idx].2;
    let value_end = labels.get(idx + 1).map_or(text.len(), |next| next.1);

    let value = text[value_start..value_end]
        .split(['\n', '|', ';'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '\'' || c == '`')
        .trim_end_matches([',', '.'])
        .trim();

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Category, severity and title of a passing verdict.
///
/// Each field is resolved on its own: the typed field first, then the labelled
/// value in `issue_analysis`, then the default.
pub fn classify(verdict: &AuditVerdict) -> IssueClassification {
    let analysis = verdict.issue_analysis.as_str();

    let category = non_blank(&verdict.category)
        .or_else(|| scan_label(analysis, "CATEGORY"))
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let severity = non_blank(&verdict.severity)
        .and_then(|s| Severity::parse_loose(&s))
        .or_else(|| scan_label(analysis, "SEVERITY").and_then(|s| Severity::parse_loose(&s)))
        .unwrap_or_default();

    let title = non_blank(&verdict.title)
        .or_else(|| scan_label(analysis, "TITLE"))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    IssueClassification {
        category,
        severity,
        title,
    }
}

// =============================================================================
// Auditor
// =============================================================================

pub struct Auditor {
    model: Arc<dyn GenerativeModel>,
}

impl Auditor {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    pub async fn audit(&self, description: &str, address: &str, image: &InlineImage) -> AuditVerdict {
        let prompt = format!(
            "Issue description: {description}\nReported address: {address}\n\
             Audit the attached photo against this description and address."
        );

        let raw = match self
            .model
            .generate_json(AUDIT_SYSTEM_PROMPT, &prompt, Some(image), AuditVerdict::gemini_schema())
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Audit call failed, rejecting as technical anomaly");
                return AuditVerdict::technical_anomaly();
            }
        };

        let verdict = parse_verdict(&raw);
        info!(
            address_valid = verdict.address_valid,
            image_matches = verdict.image_matches_description,
            confidence = ?verdict.confidence_level,
            "Audit verdict"
        );
        verdict
    }
}
