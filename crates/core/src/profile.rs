//! Academic profile types supplied by the client per request.
//!
//! A profile lets the composer personalize curriculum answers — most
//! importantly, filtering courses the student has already completed out of
//! recommendations. The server may persist a profile keyed by session, but
//! the profile has no lifecycle of its own.

use serde::{Deserialize, Serialize};

/// One completed or planned course in a student's record.
/// Owned by [`UserProfile`]; no independent identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseInput {
    /// Registrar course code, e.g. "CS0614" (optional — students often only
    /// remember the name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_code: Option<String>,

    /// Course name, e.g. "자료구조"
    pub course_name: String,

    /// Credit hours
    pub credit: u32,

    /// Letter grade, e.g. "A+", "B0" (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,

    /// Requirement area: 전공필수, 전공선택, 교양필수, 교양선택
    pub course_area: String,
}

/// A student's academic profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Admission year (학번), e.g. 2020
    pub admission_year: i32,

    /// Current semester, 1–8 (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_semester: Option<u8>,

    /// Degree track, e.g. "일반", "AI트랙"
    #[serde(default = "default_track")]
    pub track: String,

    /// Courses already taken, in the order the student entered them
    #[serde(default)]
    pub courses_taken: Vec<CourseInput>,
}

fn default_track() -> String {
    "일반".into()
}

impl UserProfile {
    /// True if the student has already taken a course matching the given
    /// code or name. Codes compare case-insensitively; names exactly.
    pub fn has_taken(&self, code_or_name: &str) -> bool {
        self.courses_taken.iter().any(|c| {
            c.course_name == code_or_name
                || c.course_code
                    .as_deref()
                    .is_some_and(|code| code.eq_ignore_ascii_case(code_or_name))
        })
    }

    /// Total credits earned across all recorded courses.
    pub fn credits_taken(&self) -> u32 {
        self.courses_taken.iter().map(|c| c.credit).sum()
    }

    /// Credits earned within one requirement area.
    pub fn credits_in_area(&self, area: &str) -> u32 {
        self.courses_taken
            .iter()
            .filter(|c| c.course_area == area)
            .map(|c| c.credit)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            admission_year: 2020,
            current_semester: Some(5),
            track: "일반".into(),
            courses_taken: vec![
                CourseInput {
                    course_code: Some("CSE101".into()),
                    course_name: "프로그래밍기초".into(),
                    credit: 3,
                    grade: Some("A+".into()),
                    course_area: "전공필수".into(),
                },
                CourseInput {
                    course_code: None,
                    course_name: "글쓰기".into(),
                    credit: 2,
                    grade: None,
                    course_area: "교양필수".into(),
                },
            ],
        }
    }

    #[test]
    fn has_taken_matches_code_case_insensitively() {
        let p = profile();
        assert!(p.has_taken("cse101"));
        assert!(p.has_taken("프로그래밍기초"));
        assert!(!p.has_taken("CSE201"));
    }

    #[test]
    fn credit_sums() {
        let p = profile();
        assert_eq!(p.credits_taken(), 5);
        assert_eq!(p.credits_in_area("전공필수"), 3);
        assert_eq!(p.credits_in_area("전공선택"), 0);
    }

    #[test]
    fn track_defaults_when_omitted() {
        let p: UserProfile =
            serde_json::from_str(r#"{"admission_year": 2021}"#).unwrap();
        assert_eq!(p.track, "일반");
        assert!(p.courses_taken.is_empty());
    }
}
