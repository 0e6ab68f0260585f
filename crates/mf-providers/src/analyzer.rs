use std::sync::Arc;

use log::info;
use mf_core::description::{self, DESCRIPTION_TEMPLATE, DescriptionPreview};
use mf_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::openai::{ChatMessage, OpenAiClient};

const CONVERSION_PROMPT: &str = "Convert the following YAML description into a natural, flowing image generation prompt. \
The prompt should be detailed but concise, incorporating all the important elements from the YAML. \
Focus on visual elements, style, and composition. Output only the prompt text, nothing else.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub yaml: String,
    pub preview: DescriptionPreview,
}

fn analysis_prompt() -> String {
    format!(
        "You are an expert image analyst. Analyze the provided image and generate a structured YAML \
description following this exact format:\n\n{DESCRIPTION_TEMPLATE}\n\n\
Important guidelines:\n\
1. Fill in ALL fields with specific, detailed descriptions in English\n\
2. Use concrete, descriptive terms (avoid vague words)\n\
3. For subjects, list all main elements in the image\n\
4. Be accurate about technical aspects like camera angle and composition\n\
5. Ensure the YAML is valid and properly formatted\n\
6. Do not add any extra fields or explanations outside the YAML"
    )
}

/// Turns images into the five-section description and descriptions into prompts.
#[derive(Debug, Clone)]
pub struct ImageAnalyzer {
    openai: Arc<OpenAiClient>,
}

impl ImageAnalyzer {
    pub fn new(openai: Arc<OpenAiClient>) -> Self {
        Self { openai }
    }

    pub async fn analyze_image(&self, image_url: &str) -> Result<ImageAnalysis> {
        if image_url.trim().is_empty() {
            return Err(Error::required("imageUrl"));
        }

        let messages = [
            ChatMessage { role: "system", content: json!(analysis_prompt()) },
            ChatMessage {
                role: "user",
                content: json!([
                    {"type": "text", "text": "Analyze this image and generate the YAML description:"},
                    {"type": "image_url", "image_url": {"url": image_url, "detail": "high"}}
                ]),
            },
        ];
        let model = &self.openai.config().vision_model;
        let yaml = self.openai.chat(model, &messages, 1000, 0.3).await?;
        let preview = description::extract_preview(&yaml);
        info!("Analyzed image, {} subject(s) found", preview.main_subjects.len());

        Ok(ImageAnalysis { yaml, preview })
    }

    /// Validates the five sections before anything is sent upstream.
    pub async fn convert_to_prompt(&self, yaml: &str) -> Result<String> {
        description::validate(yaml)?;

        let messages = [
            ChatMessage { role: "system", content: json!(CONVERSION_PROMPT) },
            ChatMessage { role: "user", content: json!(yaml) },
        ];
        let model = &self.openai.config().chat_model;
        let prompt = self.openai.chat(model, &messages, 300, 0.7).await?;
        Ok(prompt.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::OpenAiConfig;
    use crate::test_support::spawn_mock;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const YAML: &str = "scene:\n  description: A fox in snow\n  mood: quiet\nsubjects:\n  - type: fox\nenvironment:\n  setting: forest\nvisual_style:\n  art_style: watercolor\ntechnical:\n  camera_angle: eye level\n";

    fn analyzer(base_url: String) -> ImageAnalyzer {
        let mut config = OpenAiConfig::new("sk-test");
        config.base_url = base_url;
        ImageAnalyzer::new(Arc::new(OpenAiClient::new(reqwest::Client::new(), config).unwrap()))
    }

    #[tokio::test]
    async fn test_analyze_extracts_preview() {
        let app = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["messages"][1]["content"][1]["image_url"]["url"], "https://x/y.png");
                Json(serde_json::json!({"choices": [{"message": {"content": YAML}}]}))
            }),
        );
        let analysis = analyzer(spawn_mock(app).await).analyze_image("https://x/y.png").await.unwrap();
        assert_eq!(analysis.yaml, YAML);
        assert_eq!(analysis.preview.description, "A fox in snow");
        assert_eq!(analysis.preview.mood, "quiet");
        assert_eq!(analysis.preview.main_subjects, vec!["fox"]);
    }

    #[tokio::test]
    async fn test_convert_rejects_missing_section_without_calling_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({"choices": [{"message": {"content": "never"}}]}))
                }
            }),
        );
        let analyzer = analyzer(spawn_mock(app).await);

        let without_environment = YAML.replace("environment:\n  setting: forest\n", "");
        let err = analyzer.convert_to_prompt(&without_environment).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let prompt = analyzer.convert_to_prompt(YAML).await.unwrap();
        assert_eq!(prompt, "never");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
