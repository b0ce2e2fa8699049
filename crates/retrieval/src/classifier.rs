//! Query classifier — routes each turn to a retrieval strategy.
//!
//! Classification is pure keyword/pattern scoring: the same message always
//! routes the same way, which the test suite depends on. The rules:
//!
//! 1. Strong campus-info keywords (일정, 도서관, 연락처, 장학금, ...) signal
//!    `general`.
//! 2. Curriculum signals — course codes, 수강-완료 동사, requirement areas
//!    (전공필수/전선/...), 졸업사정 요청, 동일대체, 학번+요건 — signal
//!    `curriculum`.
//! 3. Both kinds of signal in one message ⇒ `hybrid`.
//! 4. A 졸업-related message with no clear signal ⇒ `hybrid`: under-fetching
//!    loses information, over-fetching only costs latency.
//! 5. No signal at all ⇒ `general`.

use haksa_core::retrieval::QueryType;
use regex::Regex;
use std::sync::LazyLock;

/// Registrar course codes: CS0614, XG0800, CSE101, ...
static COURSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,4}[0-9]{3,4}\b").expect("valid course code pattern"));

/// Campus-info keywords answered without retrieval against the curriculum
/// knowledge base (schedules, library, contacts, scholarships, shuttle).
const STRONG_GENERAL_KEYWORDS: &[&str] = &[
    // 학사 일정
    "개강", "종강", "중간고사", "기말고사", "시험", "방학", "일정", "언제", "기간", "날짜",
    // 도서관
    "도서관", "대출", "반납", "빌려", "빌릴", "열람실", "자료관",
    // 연락처/위치
    "연락처", "전화", "번호", "위치", "어디", "사무실", "실험실", "문의",
    // 기타 학교 정보
    "운영시간", "시간표", "통학", "버스", "장학금", "졸업생", "휴학생", "지역주민", "외부인",
];

/// Past-tense course completion verbs.
const TAKEN_KEYWORDS: &[&str] = &["들었", "이수했", "수강했", "완료했", "들은", "이수한"];

/// Equivalent-course replacement questions.
const EQUIVALENT_KEYWORDS: &[&str] = &["대신", "대체", "동일대체", "바뀐", "변경"];

/// Requirement areas and their common abbreviations.
const REQUIREMENT_KEYWORDS: &[&str] = &[
    "전공필수", "전공선택", "교양필수", "교양선택", "전필", "전선", "교필", "교선", "교양", "전공",
];

/// Direct graduation-assessment requests.
const ASSESSMENT_KEYWORDS: &[&str] = &[
    "졸업사정", "남은 학점", "남은 과목", "졸업 가능", "이수 현황", "진행 현황", "졸업 확인",
];

/// First-person markers: the question is about this student's own record.
const PERSONAL_INDICATORS: &[&str] = &[
    "나는", "내가", "저는", "제가", "남은", "들었", "이수했", "수강했",
];

/// Deterministic query classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify one user message.
    pub fn classify(&self, query: &str) -> QueryType {
        let general = Self::has_general_signal(query);
        let curriculum = Self::has_curriculum_signal(query);

        match (general, curriculum) {
            (true, true) => QueryType::Hybrid,
            (false, true) => QueryType::Curriculum,
            (true, false) => QueryType::General,
            // 졸업 without a clear signal is ambiguous — keep retrieval on.
            (false, false) if query.contains("졸업") => QueryType::Hybrid,
            (false, false) => QueryType::General,
        }
    }

    /// Whether answering this question needs the student's academic profile.
    pub fn needs_profile(&self, query: &str) -> bool {
        Self::has_curriculum_signal(query)
            && PERSONAL_INDICATORS.iter().any(|kw| query.contains(kw))
    }

    fn has_general_signal(query: &str) -> bool {
        STRONG_GENERAL_KEYWORDS.iter().any(|kw| query.contains(kw))
    }

    fn has_curriculum_signal(query: &str) -> bool {
        if EQUIVALENT_KEYWORDS.iter().any(|kw| query.contains(kw)) {
            return true;
        }
        if Self::has_course_info(query) {
            return true;
        }
        if ASSESSMENT_KEYWORDS.iter().any(|kw| query.contains(kw)) {
            return true;
        }
        if REQUIREMENT_KEYWORDS.iter().any(|kw| query.contains(kw)) {
            return true;
        }
        // 학번 alone is a curriculum marker; a bare calendar year only counts
        // next to a requirement keyword, which already returned above.
        query.contains("학번")
    }

    /// A course is named in the message — code pattern or a completion verb.
    fn has_course_info(query: &str) -> bool {
        if COURSE_CODE.is_match(&query.to_uppercase()) {
            return true;
        }
        TAKEN_KEYWORDS.iter().any(|kw| query.contains(kw))
    }
}
