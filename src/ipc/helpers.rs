use rusqlite::{Connection, OptionalExtension};

use crate::calc::{
    self, AssumedFlags, CalcError, ComponentMarks, GradeCutoff, GradingScheme, ManualOverride,
    SemesterSummary, Subject,
};

pub fn parse_cutoffs(raw: &str) -> Result<Vec<GradeCutoff>, CalcError> {
    serde_json::from_str(raw)
        .map_err(|e| CalcError::configuration(format!("malformed grade cutoffs: {}", e)))
}

/// Load a stored scheme by id, or the workspace default when `scheme_id` is
/// None. The parsed scheme is validated before use; evaluation never falls
/// back to ambient configuration beyond this explicit lookup.
pub fn load_scheme(conn: &Connection, scheme_id: Option<i64>) -> Result<GradingScheme, CalcError> {
    let row: Option<(String, String, i64)> = match scheme_id {
        Some(id) => conn
            .query_row(
                "SELECT scheme_name, grade_cutoffs, is_default FROM grading_schemes WHERE id = ?",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()
            .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?,
        None => conn
            .query_row(
                "SELECT scheme_name, grade_cutoffs, is_default FROM grading_schemes
                 WHERE is_default = 1 ORDER BY id LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()
            .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?,
    };

    let Some((scheme_name, cutoffs_raw, is_default)) = row else {
        return Err(CalcError::configuration(match scheme_id {
            Some(id) => format!("grading scheme {} not found", id),
            None => "no default grading scheme configured".to_string(),
        }));
    };

    let scheme = GradingScheme {
        scheme_name,
        cutoffs: parse_cutoffs(&cutoffs_raw)?,
        is_default: is_default != 0,
    };
    scheme.validate()?;
    Ok(scheme)
}

pub fn user_role(conn: &Connection, user_id: &str) -> Result<String, CalcError> {
    let role: Option<String> = conn
        .query_row("SELECT role FROM profiles WHERE id = ?", [user_id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;
    // Unknown callers are plain students; the identity provider is external.
    Ok(role.unwrap_or_else(|| "student".to_string()))
}

pub fn require_admin(conn: &Connection, user_id: &str) -> Result<(), CalcError> {
    if user_role(conn, user_id)? == "admin" {
        Ok(())
    } else {
        Err(CalcError::new("forbidden", "admin role required"))
    }
}

fn row_to_subject(r: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, Subject)> {
    let id: i64 = r.get(0)?;
    let assumed_raw: Option<String> = r.get(6)?;
    let assumed: AssumedFlags = assumed_raw
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    let overridden_grade: Option<String> = r.get(8)?;
    let overridden_points: Option<f64> = r.get(9)?;
    let manual_override = overridden_grade.map(|grade| ManualOverride {
        points: overridden_points.unwrap_or_else(|| calc::grade_points(&grade)),
        grade,
    });
    Ok((
        id,
        Subject {
            subject_name: r.get(1)?,
            credits: r.get(2)?,
            marks: ComponentMarks {
                continuous: r.get(3)?,
                midterm: r.get(4)?,
                final_exam: r.get(5)?,
            },
            assumed,
            is_graded: r.get::<_, i64>(7)? != 0,
            manual_override,
        },
    ))
}

pub fn load_subjects(
    conn: &Connection,
    semester_id: i64,
) -> Result<Vec<(i64, Subject)>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, subject_name, credits, continuous_mark, midterm_mark, final_mark,
                    assumed_marks, is_graded, overridden_grade, overridden_points
             FROM subject_marks
             WHERE semester_id = ?
             ORDER BY sort_order",
        )
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;
    stmt.query_map([semester_id], |r| row_to_subject(r))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))
}

pub fn semester_exists(conn: &Connection, semester_id: i64) -> Result<bool, CalcError> {
    conn.query_row("SELECT 1 FROM semesters WHERE id = ?", [semester_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(|e| CalcError::new("db_query_failed", e.to_string()))
}

/// Recompute a semester's SGPA and credit load from its stored marks and
/// write them back. The stored SGPA is display-rounded, matching what the
/// dashboard reads; the unrounded summary is returned to the caller.
pub fn recompute_semester(conn: &Connection, semester_id: i64) -> Result<SemesterSummary, CalcError> {
    let subjects: Vec<Subject> = load_subjects(conn, semester_id)?
        .into_iter()
        .map(|(_, s)| s)
        .collect();
    let scheme = load_scheme(conn, None)?;
    let summary = calc::semester_summary(&subjects, &scheme)?;
    conn.execute(
        "UPDATE semesters SET calculated_sgpa = ?, total_credits = ? WHERE id = ?",
        (
            calc::round_off_2_decimals(summary.sgpa),
            summary.total_credits,
            semester_id,
        ),
    )
    .map_err(|e| CalcError::new("db_update_failed", e.to_string()))?;
    Ok(summary)
}
