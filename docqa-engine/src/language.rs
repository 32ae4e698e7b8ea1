//! Heuristic language detection and validation for generated answers.
//!
//! Answers must come back in the language the user asked for. Rather than a
//! statistical classifier, detection works from Unicode script shares: the
//! Devanagari block (U+0900..U+097F) separates Hindi/Marathi from English,
//! and a small lexicon of marker words disambiguates Hindi from Marathi,
//! which share a script. This is deliberately cheap: it runs on every
//! generation attempt inside the retry loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported answer language, or `Unknown` when detection is inconclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English
    En,
    /// Hindi
    Hi,
    /// Marathi
    Mr,
    /// Could not be determined (empty input)
    Unknown,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Mr => "mr",
            Language::Unknown => "unknown",
        };
        write!(f, "{code}")
    }
}

impl FromStr for Language {
    type Err = crate::error::EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Language::En),
            "hi" => Ok(Language::Hi),
            "mr" => Ok(Language::Mr),
            other => Err(crate::error::EngineError::invalid_input(format!(
                "unsupported language: {other} (supported: en, hi, mr)"
            ))),
        }
    }
}

/// Result of language detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub language: Language,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

// Common stop words used as language markers. Checked by substring
// occurrence, not word boundaries, matching how short Devanagari particles
// attach to neighboring words.
const EN_MARKERS: &[&str] = &[
    "the", "a", "is", "are", "at", "to", "for", "of", "and", "or", "in", "on", "with", "this",
    "that",
];
const HI_MARKERS: &[&str] = &[
    "है", "को", "में", "का", "यह", "वह", "और", "या", "के", "की", "जो", "कि",
];
const MR_MARKERS: &[&str] = &[
    "आहे", "को", "मध्ये", "चा", "ही", "ते", "आणि", "किंवा", "कोण", "जे", "जी",
];

const DEVANAGARI_START: u32 = 0x0900;
const DEVANAGARI_END: u32 = 0x097F;

fn marker_hits(text: &str, markers: &[&str]) -> usize {
    markers.iter().filter(|marker| text.contains(*marker)).count()
}

/// Detect the language of `text`.
///
/// Empty or whitespace-only text yields `(Unknown, 0.0)`. Otherwise the
/// dominant script decides: a Devanagari share above one half means Hindi or
/// Marathi (marker words break the tie, Hindi winning exact ties), a Latin
/// share above one half means English. Mixed text falls back to marker-word
/// scoring across all three lexicons.
pub fn detect(text: &str) -> Detection {
    if text.trim().is_empty() {
        return Detection {
            language: Language::Unknown,
            confidence: 0.0,
        };
    }

    let total_chars = text.chars().count();
    let mut devanagari_chars = 0usize;
    let mut latin_chars = 0usize;

    for ch in text.chars() {
        let code = ch as u32;
        if (DEVANAGARI_START..=DEVANAGARI_END).contains(&code) {
            devanagari_chars += 1;
        } else if ch.is_ascii_alphabetic() {
            latin_chars += 1;
        }
    }

    let devanagari_share = devanagari_chars as f32 / total_chars as f32;
    let latin_share = latin_chars as f32 / total_chars as f32;

    tracing::debug!(
        "Language detection: devanagari {:.0}%, latin {:.0}%",
        devanagari_share * 100.0,
        latin_share * 100.0
    );

    if devanagari_share > 0.5 {
        // Hindi and Marathi share the script; marker words decide.
        let hi_hits = marker_hits(text, HI_MARKERS);
        let mr_hits = marker_hits(text, MR_MARKERS);

        if mr_hits > hi_hits {
            Detection {
                language: Language::Mr,
                confidence: (0.5 + mr_hits as f32 * 0.1).min(0.95),
            }
        } else {
            Detection {
                language: Language::Hi,
                confidence: (0.5 + hi_hits as f32 * 0.1).min(0.95),
            }
        }
    } else if latin_share > 0.5 {
        Detection {
            language: Language::En,
            confidence: (0.5 + latin_share).min(0.95),
        }
    } else {
        // Mixed or unclear script: weighted marker scoring.
        let lowered = text.to_lowercase();
        let scores = [
            (Language::En, marker_hits(&lowered, EN_MARKERS)),
            (Language::Hi, marker_hits(text, HI_MARKERS)),
            (Language::Mr, marker_hits(text, MR_MARKERS)),
        ];
        let total: usize = scores.iter().map(|(_, s)| s).sum();
        // First maximum wins, so ties (including zero hits everywhere)
        // resolve to English.
        let (mut language, mut best) = (Language::En, 0);
        for (candidate, score) in scores {
            if score > best {
                language = candidate;
                best = score;
            }
        }

        let confidence = if total > 0 {
            (best as f32 / (total as f32 + 1.0)).min(0.9)
        } else {
            0.3
        };

        Detection {
            language,
            confidence,
        }
    }
}

/// True iff `text` is detected as `expected` with at least `min_confidence`.
pub fn validate(text: &str, expected: Language, min_confidence: f32) -> bool {
    let detection = detect(text);
    let valid = detection.language == expected && detection.confidence >= min_confidence;

    tracing::debug!(
        "Language validation: expected {}, detected {} ({:.0}%), valid: {}",
        expected,
        detection.language,
        detection.confidence * 100.0,
        valid
    );

    valid
}

/// Strict single-language instruction for the system prompt, phrased natively
/// in the target language.
pub fn strict_instruction(language: Language) -> &'static str {
    match language {
        Language::Hi => {
            "महत्वपूर्ण: आप केवल हिंदी में उत्तर दें। \
             भाषाओं को मिश्रित न करें। अंग्रेजी या मराठी का उपयोग न करें। \
             हर शब्द हिंदी में होना चाहिए।"
        }
        Language::Mr => {
            "महत्वाचे: तुम्ही फक्त मराठीतच उत्तर द्या। \
             भाषा मिश्रित करू नका। इंग्रजी किंवा हिंदी वापरू नका। \
             प्रत्येक शब्द मराठीत असला पाहिजे।"
        }
        Language::En | Language::Unknown => {
            "IMPORTANT: You MUST answer ONLY in English. \
             Do not mix languages. Do not use Hindi or Marathi. \
             Every word must be in English."
        }
    }
}
