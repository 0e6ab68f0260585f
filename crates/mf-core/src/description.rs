//! The five-section structured image description exchanged between image
//! analysis and prompt conversion.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const REQUIRED_SECTIONS: [&str; 5] = ["scene", "subjects", "environment", "visual_style", "technical"];

/// Outline the analyzer is asked to fill in.
pub const DESCRIPTION_TEMPLATE: &str = "scene:
  description:
  mood:
  time_of_day:
  weather:

subjects:
  - type:
    description:
    position:
    attributes:
      -

environment:
  setting:
  foreground:
  background:
  lighting:

visual_style:
  art_style:
  color_palette:
  composition:

technical:
  camera_angle:
  focal_length:
  depth_of_field: ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionPreview {
    pub description: String,
    pub main_subjects: Vec<String>,
    pub mood: String,
}

/// Section headers that do not appear as top-level keys.
pub fn missing_sections(text: &str) -> Vec<&'static str> {
    REQUIRED_SECTIONS
        .into_iter()
        .filter(|section| !text.lines().any(|line| is_header(line, section)))
        .collect()
}

fn is_header(line: &str, section: &str) -> bool {
    line.strip_prefix(section)
        .and_then(|rest| rest.strip_prefix(':'))
        .is_some()
}

/// Reject descriptions lacking any of the five sections.
pub fn validate(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::required("yaml"));
    }
    let missing = missing_sections(text);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(format!("yaml is missing required section(s): {}", missing.join(", "))))
    }
}

/// Best-effort preview via substring search; lossy, not a real YAML parse.
pub fn extract_preview(text: &str) -> DescriptionPreview {
    let mut description = String::new();
    let mut mood = String::new();
    let mut main_subjects = Vec::new();

    for line in text.lines() {
        if description.is_empty() {
            if let Some((_, value)) = line.split_once("description:") {
                description = value.trim().to_string();
            }
        }
        if mood.is_empty() {
            if let Some((_, value)) = line.split_once("mood:") {
                mood = value.trim().to_string();
            }
        }
        if line.trim_start().starts_with('-') {
            if let Some((_, value)) = line.split_once("type:") {
                let subject = value.trim();
                if !subject.is_empty() {
                    main_subjects.push(subject.to_string());
                }
            }
        }
    }

    if description.is_empty() {
        description = "Image analysis completed".to_string();
    }
    if mood.is_empty() {
        mood = "neutral".to_string();
    }
    if main_subjects.is_empty() {
        main_subjects.push("No specific subjects identified".to_string());
    }

    DescriptionPreview { description, main_subjects, mood }
}
