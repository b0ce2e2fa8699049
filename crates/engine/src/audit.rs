//! Graduation-credit audit computed from the student's own record.
//!
//! The audit compares per-area credits in the profile against the
//! department's credit thresholds for the student's admission year. It is
//! pure arithmetic over the profile, so the same record always renders the
//! same progress block.

use haksa_core::profile::UserProfile;

/// Credit thresholds for one curriculum generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditThresholds {
    /// Total credits required to graduate
    pub total: u32,
    /// 전공필수
    pub major_required: u32,
    /// 전공선택
    pub major_elective: u32,
    /// 교양 (필수+선택 combined)
    pub liberal_arts: u32,
}

impl CreditThresholds {
    /// Thresholds by admission year. The 2025 curriculum revision rebalanced
    /// the major split; earlier years share one ruleset.
    pub fn for_year(admission_year: i32) -> Self {
        if admission_year >= 2025 {
            Self {
                total: 140,
                major_required: 36,
                major_elective: 34,
                liberal_arts: 30,
            }
        } else {
            Self {
                total: 140,
                major_required: 45,
                major_elective: 25,
                liberal_arts: 30,
            }
        }
    }
}

/// A student's credit progress against their graduation thresholds.
#[derive(Debug, Clone)]
pub struct CreditAudit {
    thresholds: CreditThresholds,
    total_taken: u32,
    major_required_taken: u32,
    major_elective_taken: u32,
    liberal_arts_taken: u32,
}

impl CreditAudit {
    pub fn new(profile: &UserProfile) -> Self {
        Self {
            thresholds: CreditThresholds::for_year(profile.admission_year),
            total_taken: profile.credits_taken(),
            major_required_taken: profile.credits_in_area("전공필수"),
            major_elective_taken: profile.credits_in_area("전공선택"),
            liberal_arts_taken: profile.credits_in_area("교양필수")
                + profile.credits_in_area("교양선택"),
        }
    }

    pub fn remaining_total(&self) -> u32 {
        self.thresholds.total.saturating_sub(self.total_taken)
    }

    fn progress_percent(&self) -> f32 {
        if self.thresholds.total == 0 {
            return 0.0;
        }
        (self.total_taken as f32 / self.thresholds.total as f32 * 1000.0).round() / 10.0
    }

    /// Credits in areas outside the requirement buckets count as 일반선택.
    fn general_elective_taken(&self) -> u32 {
        self.total_taken.saturating_sub(
            self.major_required_taken + self.major_elective_taken + self.liberal_arts_taken,
        )
    }

    /// Render the audit as a prompt block.
    pub fn render(&self) -> String {
        let t = &self.thresholds;
        let mut block = String::from("[학점 현황]\n");
        block.push_str(&format!(
            "- 전체: {}/{}학점 이수, {}학점 남음 (진행률 {:.1}%)\n",
            self.total_taken,
            t.total,
            self.remaining_total(),
            self.progress_percent()
        ));
        block.push_str(&format!(
            "- 전공필수: {}/{}학점\n",
            self.major_required_taken, t.major_required
        ));
        block.push_str(&format!(
            "- 전공선택: {}/{}학점\n",
            self.major_elective_taken, t.major_elective
        ));
        block.push_str(&format!(
            "- 교양: {}/{}학점\n",
            self.liberal_arts_taken, t.liberal_arts
        ));
        let general = self.general_elective_taken();
        if general > 0 {
            block.push_str(&format!("- 일반선택: {general}학점\n"));
        }
        block
    }
}
