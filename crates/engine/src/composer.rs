//! Response composition — prompt assembly, personalization, fallback.
//!
//! The composer owns the final-answer policy: it builds the system guidance
//! (persona, profile summary, numbered context), runs the generator, and
//! converts any generation failure into a safe Korean fallback. A composed
//! reply is never empty.

use std::sync::Arc;

use haksa_core::generate::{GenerationRequest, Generator};
use haksa_core::message::Message;
use haksa_core::profile::UserProfile;
use haksa_core::retrieval::{Retrieval, SearchSource};
use tracing::{debug, warn};

use crate::audit::CreditAudit;

/// Shown when answer generation fails outright.
const FALLBACK_MESSAGE: &str = "죄송해요, 답변 생성 중 오류가 발생했어요. 다시 시도해주세요.";

/// Shown when a personalized question arrives without an academic profile.
const PROFILE_REQUEST_MESSAGE: &str =
    "개인 맞춤 답변을 위해 학번과 수강 이력을 먼저 알려주세요.";

const PERSONA: &str = "당신은 대학교 컴퓨터공학과의 학사 안내 챗봇입니다. \
항상 한국어로, 친절하고 간결하게 답변하세요. \
참고 자료가 주어지면 그 내용에 근거해 답하고, 자료에 없는 내용은 추측하지 마세요. \
학생이 이미 이수한 과목은 다시 추천하지 마세요.";

/// A finished reply for one chat turn.
#[derive(Debug, Clone)]
pub struct Composed {
    /// The assistant message, never empty
    pub message: String,
    /// True when the generator failed and the fallback was used
    pub generation_failed: bool,
    /// True when the reply asks for a profile instead of answering
    pub profile_requested: bool,
}

/// Composes the final assistant message for a turn.
pub struct ResponseComposer {
    generator: Arc<dyn Generator>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ResponseComposer {
    pub fn new(generator: Arc<dyn Generator>, temperature: f32, max_tokens: Option<u32>) -> Self {
        Self {
            generator,
            temperature,
            max_tokens,
        }
    }

    /// Compose the reply for one turn.
    ///
    /// `wants_profile` marks a personal curriculum question; without a
    /// profile it short-circuits into a request for one, skipping generation.
    pub async fn compose(
        &self,
        user: &str,
        history: Vec<Message>,
        retrieval: &Retrieval,
        profile: Option<&UserProfile>,
        wants_profile: bool,
    ) -> Composed {
        if wants_profile && profile.is_none() {
            debug!("Personal curriculum question without a profile");
            return Composed {
                message: PROFILE_REQUEST_MESSAGE.to_string(),
                generation_failed: false,
                profile_requested: true,
            };
        }

        let sources = Self::personalized_sources(retrieval.sources(), profile);
        // Personal questions with a profile get the deterministic credit
        // audit in the prompt.
        let audit = if wants_profile {
            profile.map(CreditAudit::new)
        } else {
            None
        };
        let system = Self::system_prompt(&sources, profile, audit.as_ref());

        let request = GenerationRequest {
            system,
            history,
            user: user.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        match self.generator.generate(request).await {
            Ok(answer) if !answer.trim().is_empty() => {
                let message = Self::append_recommendations(answer, &sources, profile);
                Composed {
                    message,
                    generation_failed: false,
                    profile_requested: false,
                }
            }
            Ok(_) => Composed {
                message: FALLBACK_MESSAGE.to_string(),
                generation_failed: true,
                profile_requested: false,
            },
            Err(e) => {
                warn!(generator = self.generator.name(), error = %e, "Generation failed");
                Composed {
                    message: FALLBACK_MESSAGE.to_string(),
                    generation_failed: true,
                    profile_requested: false,
                }
            }
        }
    }

    /// Drop sources describing courses the student has already completed,
    /// so neither the prompt nor the recommendations resurface them.
    fn personalized_sources<'a>(
        sources: &'a [SearchSource],
        profile: Option<&UserProfile>,
    ) -> Vec<&'a SearchSource> {
        let Some(profile) = profile else {
            return sources.iter().collect();
        };
        sources
            .iter()
            .filter(|s| {
                let taken_by_code = s
                    .meta_str("course_code")
                    .is_some_and(|code| profile.has_taken(code));
                let taken_by_name = s
                    .meta_str("course_name")
                    .is_some_and(|name| profile.has_taken(name));
                !(taken_by_code || taken_by_name)
            })
            .collect()
    }

    fn system_prompt(
        sources: &[&SearchSource],
        profile: Option<&UserProfile>,
        audit: Option<&CreditAudit>,
    ) -> String {
        let mut prompt = String::from(PERSONA);

        if let Some(p) = profile {
            prompt.push_str("\n\n[학생 정보]\n");
            prompt.push_str(&format!("- 학번: {}학번\n", p.admission_year));
            if let Some(semester) = p.current_semester {
                prompt.push_str(&format!("- 현재 학기: {semester}학기\n"));
            }
            if p.track != "일반" {
                prompt.push_str(&format!("- 트랙: {}\n", p.track));
            }
            if !p.courses_taken.is_empty() {
                let names: Vec<&str> = p
                    .courses_taken
                    .iter()
                    .map(|c| c.course_name.as_str())
                    .collect();
                prompt.push_str(&format!(
                    "- 이수 과목 ({}학점): {}\n",
                    p.credits_taken(),
                    names.join(", ")
                ));
            }
        }

        if let Some(audit) = audit {
            prompt.push_str("\n\n");
            prompt.push_str(&audit.render());
        }

        // The context block stays last: numbered lines, nothing after them.
        if !sources.is_empty() {
            prompt.push_str("\n\n[참고 자료]\n");
            for (i, source) in sources.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, source.content.trim()));
            }
        }

        prompt
    }

    /// Append a deterministic recommendation line built from source metadata,
    /// filtered against the student's completed courses.
    fn append_recommendations(
        answer: String,
        sources: &[&SearchSource],
        profile: Option<&UserProfile>,
    ) -> String {
        let Some(profile) = profile else {
            return answer;
        };

        let mut recommendations: Vec<String> = Vec::new();
        for source in sources {
            let Some(name) = source.meta_str("course_name") else {
                continue;
            };
            if profile.has_taken(name) {
                continue;
            }
            let label = match source.meta_str("course_code") {
                Some(code) if !profile.has_taken(code) => format!("{name}({code})"),
                Some(_) => continue,
                None => name.to_string(),
            };
            if !recommendations.contains(&label) {
                recommendations.push(label);
            }
        }

        if recommendations.is_empty() {
            answer
        } else {
            format!("{answer}\n\n추천 과목: {}", recommendations.join(", "))
        }
    }
}
