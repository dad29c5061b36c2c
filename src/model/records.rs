//! Per-row data model
//!
//! Every entity is created once by one pipeline stage and never mutated;
//! the next stage derives a new value from it.

use serde::{Deserialize, Serialize};

/// Column names every input dataset must carry.
pub const REQUIRED_INPUT_COLUMNS: [&str; 4] = [
    "Commodity",
    "CommodityDescription",
    "ExtendedDescription",
    "ContractName",
];

/// One procurement line item as read from the input dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    #[serde(rename = "Commodity")]
    pub commodity: String,
    #[serde(rename = "CommodityDescription")]
    pub commodity_description: String,
    #[serde(rename = "ExtendedDescription")]
    pub extended_description: String,
    #[serde(rename = "ContractName")]
    pub contract_name: String,
}

impl InputRecord {
    pub fn new(
        commodity: impl Into<String>,
        commodity_description: impl Into<String>,
        extended_description: impl Into<String>,
        contract_name: impl Into<String>,
    ) -> Self {
        Self {
            commodity: commodity.into(),
            commodity_description: commodity_description.into(),
            extended_description: extended_description.into(),
            contract_name: contract_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedActivity {
    #[serde(rename = "SimplifiedDescription")]
    pub simplified_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub code: String,
    pub title: String,
}

impl Candidate {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
        }
    }
}

/// Up to three candidates in retrieval-rank order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub const MAX: usize = 3;

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.candidates.iter().any(|c| c.code.trim() == code.trim())
    }

    pub fn to_possible_matches(&self) -> PossibleMatches {
        let pair = |i: usize| {
            self.candidates
                .get(i)
                .map(|c| (Some(c.code.clone()), Some(c.title.clone())))
                .unwrap_or((None, None))
        };
        let (code1, title1) = pair(0);
        let (code2, title2) = pair(1);
        let (code3, title3) = pair(2);
        PossibleMatches {
            code1,
            title1,
            code2,
            title2,
            code3,
            title3,
        }
    }
}

/// Step 2 model output, also carried verbatim in the mapped record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PossibleMatches {
    #[serde(rename = "NAICSCode1", default, skip_serializing_if = "Option::is_none")]
    pub code1: Option<String>,
    #[serde(rename = "NAICSTitle1", default, skip_serializing_if = "Option::is_none")]
    pub title1: Option<String>,
    #[serde(rename = "NAICSCode2", default, skip_serializing_if = "Option::is_none")]
    pub code2: Option<String>,
    #[serde(rename = "NAICSTitle2", default, skip_serializing_if = "Option::is_none")]
    pub title2: Option<String>,
    #[serde(rename = "NAICSCode3", default, skip_serializing_if = "Option::is_none")]
    pub code3: Option<String>,
    #[serde(rename = "NAICSTitle3", default, skip_serializing_if = "Option::is_none")]
    pub title3: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl PossibleMatches {
    /// Converts to a candidate set. A pair with only one half present, or
    /// no pair at all, is malformed.
    pub fn to_candidate_set(&self) -> Result<CandidateSet, String> {
        let pairs = [
            (&self.code1, &self.title1),
            (&self.code2, &self.title2),
            (&self.code3, &self.title3),
        ];

        let mut candidates = Vec::with_capacity(CandidateSet::MAX);
        for (i, (code, title)) in pairs.into_iter().enumerate() {
            match (non_blank(code), non_blank(title)) {
                (Some(code), Some(title)) => candidates.push(Candidate::new(code, title)),
                (None, None) => {}
                _ => {
                    return Err(format!(
                        "candidate {} has a code or title but not both",
                        i + 1
                    ))
                }
            }
        }

        if candidates.is_empty() {
            return Err("no candidate code/title pairs".to_string());
        }
        Ok(CandidateSet { candidates })
    }

    pub fn code(&self, position: usize) -> Option<&str> {
        match position {
            1 => self.code1.as_deref(),
            2 => self.code2.as_deref(),
            3 => self.code3.as_deref(),
            _ => None,
        }
    }
}

/// Step 3 model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDecision {
    #[serde(rename = "BestNAICSCode")]
    pub best_code: String,
    #[serde(rename = "BestNAICSTitle")]
    pub best_title: String,
    #[serde(rename = "Justification")]
    pub justification: String,
}

impl MappingDecision {
    pub fn check(&self) -> Result<(), String> {
        if self.best_code.trim().is_empty() {
            return Err("BestNAICSCode is empty".to_string());
        }
        if self.justification.trim().is_empty() {
            return Err("Justification is empty".to_string());
        }
        Ok(())
    }
}

/// Flattened per-row result written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedOutputRecord {
    #[serde(rename = "Commodity")]
    pub commodity: String,
    #[serde(rename = "CommodityDescription")]
    pub commodity_description: String,
    #[serde(rename = "ExtendedDescription")]
    pub extended_description: String,
    #[serde(rename = "ContractName")]
    pub contract_name: String,
    #[serde(rename = "SimplifiedDescription")]
    pub simplified_description: String,
    #[serde(rename = "PossibleMatches")]
    pub possible_matches: PossibleMatches,
    #[serde(rename = "MappedNAICSCode")]
    pub mapped_code: String,
    #[serde(rename = "MappedNAICSTitle")]
    pub mapped_title: String,
    #[serde(rename = "MappingJustification")]
    pub justification: String,
}

impl MappedOutputRecord {
    pub fn assemble(
        input: &InputRecord,
        cleaned: &CleanedActivity,
        candidates: &CandidateSet,
        decision: &MappingDecision,
    ) -> Self {
        Self {
            commodity: input.commodity.clone(),
            commodity_description: input.commodity_description.clone(),
            extended_description: input.extended_description.clone(),
            contract_name: input.contract_name.clone(),
            simplified_description: cleaned.simplified_description.clone(),
            possible_matches: candidates.to_possible_matches(),
            mapped_code: decision.best_code.clone(),
            mapped_title: decision.best_title.clone(),
            justification: decision.justification.clone(),
        }
    }

    pub fn input(&self) -> InputRecord {
        InputRecord::new(
            self.commodity.clone(),
            self.commodity_description.clone(),
            self.extended_description.clone(),
            self.contract_name.clone(),
        )
    }
}

/// One row of the reference emission-factor table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionFactorRow {
    #[serde(rename = "2017 NAICS Code")]
    pub code: String,
    #[serde(rename = "Supply Chain Emission Factors with Margins")]
    pub co2e: String,
    #[serde(rename = "Reference USEEIO Code")]
    pub useeio_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowStatus {
    Succeeded,
    Failed,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Succeeded => "SUCCEEDED",
            RowStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    #[serde(rename = "Stage")]
    pub stage: String,
    #[serde(rename = "Message")]
    pub message: String,
}

/// The object written for every processed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowArtifact {
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "Status")]
    pub status: RowStatus,
    #[serde(rename = "Input")]
    pub input: InputRecord,
    #[serde(rename = "Output", default, skip_serializing_if = "Option::is_none")]
    pub output: Option<MappedOutputRecord>,
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RowError>,
}

impl RowArtifact {
    pub fn succeeded(index: usize, input: InputRecord, output: MappedOutputRecord) -> Self {
        Self {
            index,
            status: RowStatus::Succeeded,
            input,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(index: usize, input: InputRecord, error: RowError) -> Self {
        Self {
            index,
            status: RowStatus::Failed,
            input,
            output: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gloves() -> InputRecord {
        InputRecord::new(
            "20142770002",
            "GLOVES WORK MECHANIC SYNTHETIC LEATHER SZ LARGE",
            "RC LN_____ QTY DEL_____",
            "MSC items for Glen Bell warehouse",
        )
    }

    #[test]
    fn input_record_uses_dataset_column_names() {
        let value = serde_json::to_value(gloves()).unwrap();
        assert_eq!(value["Commodity"], "20142770002");
        assert_eq!(value["ContractName"], "MSC items for Glen Bell warehouse");
    }

    #[test]
    fn possible_matches_accepts_partial_sets() {
        let matches: PossibleMatches = serde_json::from_value(json!({
            "NAICSCode1": "315990",
            "NAICSTitle1": "Apparel Accessories and Other Apparel Manufacturing",
            "NAICSCode2": "339920",
            "NAICSTitle2": "Sporting and Athletic Goods Manufacturing"
        }))
        .unwrap();

        let set = matches.to_candidate_set().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains_code("339920"));
        assert_eq!(set.to_possible_matches().code3, None);
    }

    #[test]
    fn possible_matches_rejects_empty_and_half_pairs() {
        assert!(PossibleMatches::default().to_candidate_set().is_err());

        let half = PossibleMatches {
            code1: Some("315990".to_string()),
            ..Default::default()
        };
        assert!(half.to_candidate_set().is_err());
    }

    #[test]
    fn decision_requires_code_and_justification() {
        let decision = MappingDecision {
            best_code: "315990".to_string(),
            best_title: "Apparel".to_string(),
            justification: " ".to_string(),
        };
        assert!(decision.check().is_err());
    }

    #[test]
    fn mapped_record_preserves_input_fields() {
        let input = gloves();
        let cleaned = CleanedActivity {
            simplified_description: "synthetic leather large work gloves".to_string(),
        };
        let candidates = PossibleMatches {
            code1: Some("315990".to_string()),
            title1: Some("Apparel Accessories and Other Apparel Manufacturing".to_string()),
            ..Default::default()
        }
        .to_candidate_set()
        .unwrap();
        let decision = MappingDecision {
            best_code: "315990".to_string(),
            best_title: "Apparel Accessories and Other Apparel Manufacturing".to_string(),
            justification: "Work gloves are apparel accessories".to_string(),
        };

        let record = MappedOutputRecord::assemble(&input, &cleaned, &candidates, &decision);
        assert_eq!(record.input(), input);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["MappedNAICSCode"], "315990");
        assert_eq!(value["PossibleMatches"]["NAICSCode1"], "315990");
        assert!(value["PossibleMatches"].get("NAICSCode2").is_none());
    }

    #[test]
    fn row_artifact_omits_absent_sections() {
        let artifact = RowArtifact::failed(
            4,
            gloves(),
            RowError {
                stage: "select".to_string(),
                message: "bad json".to_string(),
            },
        );
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["Status"], "FAILED");
        assert!(value.get("Output").is_none());
        assert_eq!(value["Error"]["Stage"], "select");
    }
}
