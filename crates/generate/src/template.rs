//! Template generation backend — deterministic, fully offline.
//!
//! Echoes the retrieved context back as a readable Korean answer. Useful for
//! local development without an API key and as the generator behind the
//! gateway tests, where a network call would make assertions flaky.

use async_trait::async_trait;
use haksa_core::error::GenerationError;
use haksa_core::generate::{GenerationRequest, Generator};

/// Marker line the composer puts in front of retrieved context.
const CONTEXT_HEADER: &str = "[참고 자료]";

/// A generator that assembles answers from the prompt itself.
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Pull the numbered context lines out of the system prompt, if any.
    fn context_lines(system: &str) -> Vec<&str> {
        let Some(start) = system.find(CONTEXT_HEADER) else {
            return Vec::new();
        };
        system[start + CONTEXT_HEADER.len()..]
            .lines()
            .map(str::trim)
            .take_while(|line| line.is_empty() || line.starts_with(|c: char| c.is_ascii_digit()))
            .filter(|line| !line.is_empty())
            .collect()
    }
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for TemplateGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let context = Self::context_lines(&request.system);

        let mut answer = String::new();
        if context.is_empty() {
            answer.push_str(&format!(
                "\"{}\"에 대해 안내드릴게요. 학과 사무실이나 학교 홈페이지에서 더 자세한 내용을 확인하실 수 있습니다.",
                request.user.trim()
            ));
        } else {
            answer.push_str("문의하신 내용에 대한 안내입니다.\n");
            for line in &context {
                // Strip the "1. " numbering the composer added.
                let body = line
                    .split_once(". ")
                    .map(|(_, rest)| rest)
                    .unwrap_or(line);
                answer.push_str(&format!("- {body}\n"));
            }
            answer.push_str("추가로 궁금한 점이 있으면 말씀해주세요.");
        }

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(system: &str, user: &str) -> GenerationRequest {
        GenerationRequest {
            system: system.into(),
            history: vec![],
            user: user.into(),
            temperature: 0.3,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn answer_without_context_is_never_empty() {
        let generator = TemplateGenerator::new();
        let answer = generator
            .generate(request("당신은 학과 안내 챗봇입니다.", "도서관 몇 시까지 해?"))
            .await
            .unwrap();
        assert!(!answer.trim().is_empty());
        assert!(answer.contains("도서관 몇 시까지 해?"));
    }

    #[tokio::test]
    async fn context_lines_surface_in_the_answer() {
        let system = "당신은 학과 안내 챗봇입니다.\n\n[참고 자료]\n1. 자료구조(CSE201)는 2학년 1학기 과목입니다.\n2. 알고리즘(CSE301)은 3학년 과목입니다.\n";
        let generator = TemplateGenerator::new();
        let answer = generator
            .generate(request(system, "자료구조 언제 들어?"))
            .await
            .unwrap();
        assert!(answer.contains("자료구조(CSE201)는 2학년 1학기 과목입니다."));
        assert!(answer.contains("알고리즘(CSE301)은 3학년 과목입니다."));
    }

    #[test]
    fn context_extraction_stops_at_non_numbered_lines() {
        let system = "[참고 자료]\n1. 첫 번째 자료\n2. 두 번째 자료\n답변 지침: 간결하게 답하세요.";
        let lines = TemplateGenerator::context_lines(system);
        assert_eq!(lines.len(), 2);
    }
}
