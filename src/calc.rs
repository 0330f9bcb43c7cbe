use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Fixed grade-letter to grade-point table. Grades outside this table
/// (including the pass/fail bands S and U) carry zero points.
pub const GRADE_POINTS: &[(&str, f64)] = &[
    ("A+", 10.0),
    ("A", 9.0),
    ("B+", 8.0),
    ("B", 7.0),
    ("C", 6.0),
    ("P", 5.0),
    ("P-", 4.0),
    ("F", 0.0),
];

/// Ungraded subjects report Satisfactory at or above this total.
pub const PASS_BAND_MIN: f64 = 40.0;

/// The final-exam component is marked out of 40 of the subject's 100 total.
pub const FINAL_COMPONENT_MAX: f64 = 40.0;

pub fn grade_points(grade: &str) -> f64 {
    GRADE_POINTS
        .iter()
        .find(|(g, _)| *g == grade)
        .map(|(_, p)| *p)
        .unwrap_or(0.0)
}

/// 2-decimal display rounding: `floor(100*x + 0.5) / 100`.
/// Internal aggregates stay unrounded; round only at the display/storage edge.
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new("configuration_error", message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeCutoff {
    pub grade: String,
    pub min_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingScheme {
    pub scheme_name: String,
    pub cutoffs: Vec<GradeCutoff>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeResolution {
    pub grade: String,
    pub points: f64,
}

impl GradingScheme {
    /// A usable scheme needs at least one cutoff and a baseline entry at or
    /// below zero so every total resolves to some grade.
    pub fn validate(&self) -> Result<(), CalcError> {
        if self.cutoffs.is_empty() {
            return Err(CalcError::configuration(format!(
                "grading scheme '{}' has no cutoffs",
                self.scheme_name
            )));
        }
        if !self.cutoffs.iter().any(|c| c.min_total <= 0.0) {
            return Err(CalcError::configuration(format!(
                "grading scheme '{}' has no zero-cutoff fallback grade",
                self.scheme_name
            )));
        }
        Ok(())
    }

    /// Highest cutoff at or below `total` wins. Totals below every cutoff
    /// (negative marks) fall back to the baseline grade.
    pub fn resolve(&self, total: f64) -> Result<GradeResolution, CalcError> {
        self.validate()?;
        let mut sorted: Vec<&GradeCutoff> = self.cutoffs.iter().collect();
        sorted.sort_by(|a, b| {
            b.min_total
                .partial_cmp(&a.min_total)
                .unwrap_or(Ordering::Equal)
        });
        let cutoff = sorted
            .iter()
            .find(|c| total >= c.min_total)
            .copied()
            .or_else(|| sorted.last().copied())
            .ok_or_else(|| {
                CalcError::configuration(format!(
                    "grading scheme '{}' has no cutoffs",
                    self.scheme_name
                ))
            })?;
        Ok(GradeResolution {
            grade: cutoff.grade.clone(),
            points: grade_points(&cutoff.grade),
        })
    }
}

/// Up to three partial scores summing to a subject's total. An absent
/// component counts as zero, so partially entered subjects show a
/// provisional total; completeness is tracked separately.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMarks {
    pub continuous: Option<f64>,
    pub midterm: Option<f64>,
    #[serde(rename = "final")]
    pub final_exam: Option<f64>,
}

impl ComponentMarks {
    pub fn total(&self) -> f64 {
        self.continuous.unwrap_or(0.0)
            + self.midterm.unwrap_or(0.0)
            + self.final_exam.unwrap_or(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.continuous.is_some() && self.midterm.is_some() && self.final_exam.is_some()
    }

    /// What-if completeness heuristic: the final exam is outstanding when its
    /// mark is absent or zero. This conflates "not yet taken" with
    /// "legitimately scored zero"; the stored data cannot tell them apart.
    pub fn needs_final(&self) -> bool {
        match self.final_exam {
            None => true,
            Some(v) => v == 0.0,
        }
    }
}

/// Which component values are assumed (projected) rather than official.
/// Display metadata only; assumed values still count toward the total.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssumedFlags {
    pub continuous: bool,
    pub midterm: bool,
    #[serde(rename = "final")]
    pub final_exam: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManualOverride {
    pub grade: String,
    pub points: f64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub subject_name: String,
    pub credits: i64,
    #[serde(default)]
    pub marks: ComponentMarks,
    #[serde(default)]
    pub assumed: AssumedFlags,
    #[serde(default = "default_true")]
    pub is_graded: bool,
    #[serde(default)]
    pub manual_override: Option<ManualOverride>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectEvaluation {
    pub total: f64,
    pub grade: String,
    pub points: f64,
    pub graded: bool,
    pub overridden: bool,
}

/// Recompute a subject's derived fields. Callers invoke this eagerly after
/// every mutation; there is no implicit recalculation anywhere.
pub fn evaluate_subject(
    subject: &Subject,
    scheme: &GradingScheme,
) -> Result<SubjectEvaluation, CalcError> {
    if subject.credits < 0 {
        return Err(CalcError::validation(format!(
            "subject '{}' has negative credits",
            subject.subject_name
        )));
    }

    let total = subject.marks.total();

    if !subject.is_graded {
        // Pass/fail band, independent of the points table. Excluded from SGPA.
        let band = if total >= PASS_BAND_MIN { "S" } else { "U" };
        return Ok(SubjectEvaluation {
            total,
            grade: band.to_string(),
            points: 0.0,
            graded: false,
            overridden: false,
        });
    }

    if let Some(ov) = &subject.manual_override {
        return Ok(SubjectEvaluation {
            total,
            grade: ov.grade.clone(),
            points: ov.points,
            graded: true,
            overridden: true,
        });
    }

    let resolved = scheme.resolve(total)?;
    Ok(SubjectEvaluation {
        total,
        grade: resolved.grade,
        points: resolved.points,
        graded: true,
        overridden: false,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SemesterSummary {
    /// Unrounded; apply `round_off_2_decimals` at the display/storage edge.
    pub sgpa: f64,
    pub credits_for_gpa: i64,
    pub total_credits: i64,
}

/// Credit-weighted SGPA over graded subjects. `total_credits` counts graded
/// and ungraded subjects alike so the semester's credit load is never
/// under-reported; it is the weight CGPA uses.
pub fn semester_summary(
    subjects: &[Subject],
    scheme: &GradingScheme,
) -> Result<SemesterSummary, CalcError> {
    let mut weighted_points = 0.0_f64;
    let mut credits_for_gpa = 0_i64;
    let mut total_credits = 0_i64;

    for subject in subjects {
        let eval = evaluate_subject(subject, scheme)?;
        total_credits += subject.credits;
        if eval.graded {
            credits_for_gpa += subject.credits;
            weighted_points += eval.points * subject.credits as f64;
        }
    }

    // Zero graded credits is not an error; the semester just reports 0.
    let sgpa = if credits_for_gpa > 0 {
        weighted_points / credits_for_gpa as f64
    } else {
        0.0
    };

    Ok(SemesterSummary {
        sgpa,
        credits_for_gpa,
        total_credits,
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterWeight {
    pub sgpa: f64,
    pub total_credits: i64,
}

/// Credit-weighted average of SGPA across semesters; 0 when no credits are
/// recorded anywhere.
pub fn cumulative_gpa(semesters: &[SemesterWeight]) -> f64 {
    let mut weighted = 0.0_f64;
    let mut credits = 0_i64;
    for s in semesters {
        weighted += s.sgpa * s.total_credits as f64;
        credits += s.total_credits;
    }
    if credits > 0 {
        weighted / credits as f64
    } else {
        0.0
    }
}

/// Approximate reverse of the grade-point lookup. Many totals produce the
/// same grade point, so this staircase picks a representative mark per band;
/// it is not an exact inversion.
pub fn required_mark_for_points(points: f64) -> f64 {
    if points >= 9.5 {
        90.0
    } else if points >= 8.5 {
        80.0
    } else if points >= 7.5 {
        70.0
    } else if points >= 6.5 {
        60.0
    } else if points >= 5.5 {
        52.0
    } else if points >= 4.5 {
        47.0
    } else if points >= 3.5 {
        42.0
    } else {
        (points * 10.0).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfProgress {
    pub secured_points: f64,
    pub secured_credits: i64,
    pub remaining_credits: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTarget {
    pub subject_name: String,
    pub credits: i64,
    /// Clamped to `FINAL_COMPONENT_MAX` for display. A globally reachable
    /// average can still be per-subject infeasible once clamped; compare
    /// against `required_average_mark` to spot the gap.
    pub required_final_mark: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfOutcome {
    pub required_average_points: f64,
    pub required_average_mark: f64,
    pub target_subjects: Vec<SubjectTarget>,
    /// Range check only (points <= 10 and mark <= 100), not a per-subject
    /// feasibility proof.
    pub is_achievable: bool,
    pub progress: WhatIfProgress,
}

/// Average mark required on the outstanding final exams to reach `target`
/// SGPA, apportioned per incomplete subject. Subjects with all three
/// components entered are "complete" and contribute secured points; subjects
/// whose final mark is absent or zero are "incomplete" and receive a target.
/// A subject may be neither (partial entry with a nonzero final); it still
/// counts toward total credits.
pub fn solve_what_if(
    target: f64,
    subjects: &[Subject],
    scheme: &GradingScheme,
) -> Result<WhatIfOutcome, CalcError> {
    if !(0.0..=10.0).contains(&target) {
        return Err(CalcError::validation("target SGPA must be between 0 and 10"));
    }
    if subjects.is_empty() {
        return Err(CalcError::validation("semester has no subjects"));
    }

    let mut secured_points = 0.0_f64;
    let mut secured_credits = 0_i64;
    let mut total_credits = 0_i64;

    for subject in subjects {
        if subject.credits < 0 {
            return Err(CalcError::validation(format!(
                "subject '{}' has negative credits",
                subject.subject_name
            )));
        }
        total_credits += subject.credits;
        if subject.marks.is_complete() {
            let resolved = scheme.resolve(subject.marks.total())?;
            secured_points += resolved.points * subject.credits as f64;
            secured_credits += subject.credits;
        }
    }

    let remaining_credits = total_credits - secured_credits;
    let progress = WhatIfProgress {
        secured_points,
        secured_credits,
        remaining_credits,
    };

    // Every subject already fixed: nothing left to earn, trivially achievable.
    if remaining_credits == 0 {
        return Ok(WhatIfOutcome {
            required_average_points: 0.0,
            required_average_mark: 0.0,
            target_subjects: Vec::new(),
            is_achievable: true,
            progress,
        });
    }

    let required_total_points = target * total_credits as f64;
    let required_average_points =
        (required_total_points - secured_points) / remaining_credits as f64;
    let required_average_mark = required_mark_for_points(required_average_points);

    let target_subjects = subjects
        .iter()
        .filter(|s| s.marks.needs_final())
        .map(|s| {
            let entered = s.marks.continuous.unwrap_or(0.0) + s.marks.midterm.unwrap_or(0.0);
            SubjectTarget {
                subject_name: s.subject_name.clone(),
                credits: s.credits,
                required_final_mark: (required_average_mark - entered)
                    .clamp(0.0, FINAL_COMPONENT_MAX),
            }
        })
        .collect();

    let is_achievable = required_average_points <= 10.0 && required_average_mark <= 100.0;

    Ok(WhatIfOutcome {
        required_average_points,
        required_average_mark,
        target_subjects,
        is_achievable,
        progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> GradingScheme {
        let cutoffs = [
            ("A+", 85.0),
            ("A", 75.0),
            ("B+", 65.0),
            ("B", 55.0),
            ("C", 50.0),
            ("P", 45.0),
            ("P-", 40.0),
            ("F", 0.0),
        ];
        GradingScheme {
            scheme_name: "Standard".to_string(),
            cutoffs: cutoffs
                .iter()
                .map(|(g, m)| GradeCutoff {
                    grade: g.to_string(),
                    min_total: *m,
                })
                .collect(),
            is_default: true,
        }
    }

    fn graded(name: &str, credits: i64, cws: f64, mte: f64, ete: f64) -> Subject {
        Subject {
            subject_name: name.to_string(),
            credits,
            marks: ComponentMarks {
                continuous: Some(cws),
                midterm: Some(mte),
                final_exam: Some(ete),
            },
            assumed: AssumedFlags::default(),
            is_graded: true,
            manual_override: None,
        }
    }

    fn incomplete(name: &str, credits: i64, cws: f64, mte: f64) -> Subject {
        Subject {
            subject_name: name.to_string(),
            credits,
            marks: ComponentMarks {
                continuous: Some(cws),
                midterm: Some(mte),
                final_exam: None,
            },
            assumed: AssumedFlags::default(),
            is_graded: true,
            manual_override: None,
        }
    }

    #[test]
    fn round_off_two_decimals() {
        assert_eq!(round_off_2_decimals(0.0), 0.0);
        assert_eq!(round_off_2_decimals(6.899999), 6.9);
        assert_eq!(round_off_2_decimals(7.526315), 7.53);
        assert_eq!(round_off_2_decimals(8.004), 8.0);
    }

    #[test]
    fn resolve_includes_exact_cutoff_boundaries() {
        let s = scheme();
        for cutoff in &s.cutoffs {
            let got = s.resolve(cutoff.min_total).expect("resolve boundary");
            assert_eq!(got.grade, cutoff.grade, "at mark {}", cutoff.min_total);
        }
    }

    #[test]
    fn resolve_scenario_totals() {
        let s = scheme();
        let totals = [90.0, 70.0, 50.0, 30.0];
        let expected = [("A+", 10.0), ("B+", 8.0), ("C", 6.0), ("F", 0.0)];
        for (total, (grade, points)) in totals.iter().zip(expected.iter()) {
            let got = s.resolve(*total).expect("resolve");
            assert_eq!(got.grade, *grade);
            assert_eq!(got.points, *points);
        }
    }

    #[test]
    fn resolve_negative_mark_falls_back_to_baseline() {
        let got = scheme().resolve(-5.0).expect("resolve");
        assert_eq!(got.grade, "F");
        assert_eq!(got.points, 0.0);
    }

    #[test]
    fn scheme_without_cutoffs_is_invalid() {
        let s = GradingScheme {
            scheme_name: "Empty".to_string(),
            cutoffs: Vec::new(),
            is_default: false,
        };
        let err = s.resolve(50.0).expect_err("must fail");
        assert_eq!(err.code, "configuration_error");
    }

    #[test]
    fn scheme_without_baseline_is_invalid() {
        let s = GradingScheme {
            scheme_name: "NoFallback".to_string(),
            cutoffs: vec![GradeCutoff {
                grade: "A".to_string(),
                min_total: 75.0,
            }],
            is_default: false,
        };
        let err = s.validate().expect_err("must fail");
        assert_eq!(err.code, "configuration_error");
    }

    #[test]
    fn evaluate_partial_entry_shows_provisional_total() {
        let mut subject = graded("DBMS", 4, 0.0, 0.0, 0.0);
        subject.marks = ComponentMarks {
            continuous: Some(25.0),
            midterm: None,
            final_exam: None,
        };
        let eval = evaluate_subject(&subject, &scheme()).expect("evaluate");
        assert_eq!(eval.total, 25.0);
        assert_eq!(eval.grade, "F");
        assert!(!subject.marks.is_complete());
    }

    #[test]
    fn evaluate_honors_manual_override() {
        let mut subject = graded("Networks", 3, 20.0, 15.0, 10.0);
        subject.manual_override = Some(ManualOverride {
            grade: "B+".to_string(),
            points: 8.0,
        });
        let eval = evaluate_subject(&subject, &scheme()).expect("evaluate");
        assert_eq!(eval.grade, "B+");
        assert_eq!(eval.points, 8.0);
        assert!(eval.overridden);
    }

    #[test]
    fn evaluate_ungraded_uses_pass_band() {
        let mut subject = graded("NSS", 2, 20.0, 15.0, 10.0);
        subject.is_graded = false;
        let eval = evaluate_subject(&subject, &scheme()).expect("evaluate");
        assert_eq!(eval.grade, "S");
        assert_eq!(eval.points, 0.0);
        assert!(!eval.graded);

        subject.marks.final_exam = Some(0.0);
        let eval = evaluate_subject(&subject, &scheme()).expect("evaluate");
        assert_eq!(eval.grade, "U");
    }

    #[test]
    fn evaluate_rejects_negative_credits() {
        let subject = graded("Ghost", -1, 10.0, 10.0, 10.0);
        let err = evaluate_subject(&subject, &scheme()).expect_err("must fail");
        assert_eq!(err.code, "validation_error");
    }

    #[test]
    fn sgpa_scenario_weighted_average() {
        // credits [4,3,3], points [9,7,6] => (36+21+18)/10 = 7.5
        let subjects = vec![
            graded("S1", 4, 25.0, 25.0, 30.0), // 80 -> A -> 9
            graded("S2", 3, 20.0, 20.0, 20.0), // 60 -> B -> 7
            graded("S3", 3, 15.0, 15.0, 20.0), // 50 -> C -> 6
        ];
        let summary = semester_summary(&subjects, &scheme()).expect("summary");
        assert!((summary.sgpa - 7.5).abs() < 1e-9);
        assert_eq!(summary.credits_for_gpa, 10);
        assert_eq!(summary.total_credits, 10);
    }

    #[test]
    fn ungraded_subjects_counted_in_credits_but_not_sgpa() {
        let mut audit = graded("Audit", 2, 30.0, 30.0, 30.0);
        audit.is_graded = false;
        let subjects = vec![
            graded("S1", 4, 25.0, 25.0, 30.0), // 80 -> 9 points
            audit,
        ];
        let summary = semester_summary(&subjects, &scheme()).expect("summary");
        assert!((summary.sgpa - 9.0).abs() < 1e-9);
        assert_eq!(summary.credits_for_gpa, 4);
        assert_eq!(summary.total_credits, 6);
    }

    #[test]
    fn zero_credit_semester_reports_zero() {
        let mut audit = graded("Audit", 3, 50.0, 20.0, 20.0);
        audit.is_graded = false;
        let summary = semester_summary(&[audit], &scheme()).expect("summary");
        assert_eq!(summary.sgpa, 0.0);
        assert_eq!(summary.credits_for_gpa, 0);
        assert_eq!(summary.total_credits, 3);
    }

    #[test]
    fn cgpa_of_single_semester_is_its_sgpa() {
        let got = cumulative_gpa(&[SemesterWeight {
            sgpa: 7.42,
            total_credits: 22,
        }]);
        assert!((got - 7.42).abs() < 1e-9);
    }

    #[test]
    fn cgpa_scenario_weighted_across_semesters() {
        let got = cumulative_gpa(&[
            SemesterWeight {
                sgpa: 8.0,
                total_credits: 20,
            },
            SemesterWeight {
                sgpa: 7.0,
                total_credits: 18,
            },
        ]);
        assert!((got - 286.0 / 38.0).abs() < 1e-9);
        assert_eq!(round_off_2_decimals(got), 7.53);
    }

    #[test]
    fn cgpa_with_no_credits_is_zero() {
        assert_eq!(cumulative_gpa(&[]), 0.0);
        assert_eq!(
            cumulative_gpa(&[SemesterWeight {
                sgpa: 9.0,
                total_credits: 0
            }]),
            0.0
        );
    }

    #[test]
    fn what_if_scenario_target_eight() {
        // securedPoints 60 over securedCredits 8, totalCredits 20:
        // requiredTotalPoints 160, remaining 100 over 12 credits => ~8.33.
        let subjects = vec![
            graded("Done1", 4, 30.0, 25.0, 30.0), // 85 -> A+ -> 10 * 4 = 40
            graded("Done2", 4, 15.0, 15.0, 15.0), // 45 -> P  -> 5 * 4 = 20
            incomplete("Open1", 6, 25.0, 20.0),
            incomplete("Open2", 6, 20.0, 20.0),
        ];
        let out = solve_what_if(8.0, &subjects, &scheme()).expect("solve");
        assert_eq!(out.progress.secured_points, 60.0);
        assert_eq!(out.progress.secured_credits, 8);
        assert_eq!(out.progress.remaining_credits, 12);
        assert!((out.required_average_points - 100.0 / 12.0).abs() < 1e-9);
        assert_eq!(out.required_average_mark, 70.0);
        assert!(out.is_achievable);

        assert_eq!(out.target_subjects.len(), 2);
        // 70 required minus what is already entered, capped at the 40-mark final.
        assert_eq!(out.target_subjects[0].required_final_mark, 25.0);
        assert_eq!(out.target_subjects[1].required_final_mark, 30.0);
    }

    #[test]
    fn what_if_all_complete_is_trivially_achievable() {
        let subjects = vec![
            graded("Done1", 4, 30.0, 25.0, 30.0),
            graded("Done2", 3, 20.0, 20.0, 25.0),
        ];
        let out = solve_what_if(10.0, &subjects, &scheme()).expect("solve");
        assert_eq!(out.required_average_points, 0.0);
        assert_eq!(out.required_average_mark, 0.0);
        assert!(out.target_subjects.is_empty());
        assert!(out.is_achievable);
        assert_eq!(out.progress.remaining_credits, 0);
    }

    #[test]
    fn what_if_target_zero_requires_nothing() {
        let subjects = vec![
            graded("Done", 4, 30.0, 25.0, 30.0),
            incomplete("Open", 4, 10.0, 10.0),
        ];
        let out = solve_what_if(0.0, &subjects, &scheme()).expect("solve");
        assert!(out.required_average_points <= 0.0);
        assert_eq!(out.required_average_mark, 0.0);
        for t in &out.target_subjects {
            assert_eq!(t.required_final_mark, 0.0);
        }
    }

    #[test]
    fn what_if_zero_final_is_complete_but_still_targeted() {
        let zero_final = graded("ZeroFinal", 3, 20.0, 20.0, 0.0);
        let subjects = vec![graded("Done", 3, 30.0, 25.0, 30.0), zero_final];
        let out = solve_what_if(9.0, &subjects, &scheme()).expect("solve");
        // All three components are present on both subjects, so nothing is
        // outstanding by the credits accounting even though the zero final
        // would be targeted if any credits remained.
        assert_eq!(out.progress.secured_credits, 6);
        assert_eq!(out.progress.remaining_credits, 0);
        assert!(out.target_subjects.is_empty());
    }

    #[test]
    fn what_if_rejects_out_of_range_target() {
        let subjects = vec![incomplete("Open", 4, 10.0, 10.0)];
        let err = solve_what_if(10.5, &subjects, &scheme()).expect_err("must fail");
        assert_eq!(err.code, "validation_error");
        let err = solve_what_if(-0.1, &subjects, &scheme()).expect_err("must fail");
        assert_eq!(err.code, "validation_error");
    }

    #[test]
    fn what_if_rejects_empty_subject_list() {
        let err = solve_what_if(8.0, &[], &scheme()).expect_err("must fail");
        assert_eq!(err.code, "validation_error");
    }

    #[test]
    fn unreachable_target_flagged_not_achievable() {
        let subjects = vec![
            graded("Done", 10, 15.0, 15.0, 15.0), // 45 -> P -> 5 * 10 = 50
            incomplete("Open", 2, 0.0, 0.0),
        ];
        let out = solve_what_if(9.0, &subjects, &scheme()).expect("solve");
        // (9*12 - 50) / 2 = 29 points per remaining credit.
        assert!(out.required_average_points > 10.0);
        assert!(!out.is_achievable);
    }
}
