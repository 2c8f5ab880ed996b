use serde::{ Deserialize, Serialize };
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use url::Url;
use log::info;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge base '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse knowledge base '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid knowledge base: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Treatment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Display price, quoted to visitors as a starting price (e.g. "¥30,000〜").
    pub price: String,
    /// Treatment or category page on the clinic site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qa: Vec<QaEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Clinic {
    pub name: String,
    /// Reservation page for this clinic.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct KnowledgeBase {
    pub treatments: Vec<Treatment>,
    pub clinics: Vec<Clinic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faq: Vec<QaEntry>,
}

impl KnowledgeBase {
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        for (idx, treatment) in self.treatments.iter().enumerate() {
            if treatment.name.trim().is_empty() {
                return Err(KnowledgeError::Invalid(format!("treatments[{}] has an empty name", idx)));
            }
            if treatment.price.trim().is_empty() {
                return Err(
                    KnowledgeError::Invalid(format!("treatment '{}' has an empty price", treatment.name))
                );
            }
            if let Some(url) = &treatment.url {
                check_url(url).map_err(|reason|
                    KnowledgeError::Invalid(format!("treatment '{}' url: {}", treatment.name, reason))
                )?;
            }
            for qa in &treatment.qa {
                if qa.question.trim().is_empty() || qa.answer.trim().is_empty() {
                    return Err(
                        KnowledgeError::Invalid(
                            format!("treatment '{}' has an incomplete qa entry", treatment.name)
                        )
                    );
                }
            }
        }

        let mut seen = HashSet::new();
        for (idx, clinic) in self.clinics.iter().enumerate() {
            if clinic.name.trim().is_empty() {
                return Err(KnowledgeError::Invalid(format!("clinics[{}] has an empty name", idx)));
            }
            if !seen.insert(clinic.name.trim()) {
                return Err(KnowledgeError::Invalid(format!("duplicate clinic '{}'", clinic.name)));
            }
            check_url(&clinic.url).map_err(|reason|
                KnowledgeError::Invalid(format!("clinic '{}' url: {}", clinic.name, reason))
            )?;
        }

        for qa in &self.faq {
            if qa.question.trim().is_empty() || qa.answer.trim().is_empty() {
                return Err(KnowledgeError::Invalid("faq has an incomplete entry".to_string()));
            }
        }
        Ok(())
    }

    /// Pretty JSON with two-space indentation, the form embedded in the system prompt.
    pub fn to_prompt_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn check_url(raw: &str) -> Result<(), String> {
    let parsed = Url::parse(raw).map_err(|e| format!("'{}' is not a valid URL ({})", raw, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("'{}' uses unsupported scheme '{}'", raw, other)),
    }
}

pub fn parse_knowledge(json: &str, origin: &str) -> Result<KnowledgeBase, KnowledgeError> {
    let kb: KnowledgeBase = serde_json::from_str(json).map_err(|source| KnowledgeError::Parse {
        path: origin.to_string(),
        source,
    })?;
    kb.validate()?;
    Ok(kb)
}

pub fn load_knowledge<P: AsRef<Path>>(path: P) -> Result<Arc<KnowledgeBase>, KnowledgeError> {
    let display = path.as_ref().display().to_string();
    let file_content = fs::read_to_string(&path).map_err(|source| KnowledgeError::Io {
        path: display.clone(),
        source,
    })?;
    let kb = parse_knowledge(&file_content, &display)?;
    info!(
        "Knowledge base loaded from {}: {} treatments, {} clinics",
        display,
        kb.treatments.len(),
        kb.clinics.len()
    );
    Ok(Arc::new(kb))
}
