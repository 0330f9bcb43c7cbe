use crate::calc::{self, Subject};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

fn handle_marks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let semester_id = match req.params.get("semesterId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing semesterId", None),
    };
    match helpers::semester_exists(conn, semester_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "semester not found", None),
        Err(e) => return calc_err(&req.id, e),
    }

    let rows = match helpers::load_subjects(conn, semester_id) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let scheme = match helpers::load_scheme(conn, None) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    let mut subjects = Vec::with_capacity(rows.len());
    let mut bare: Vec<Subject> = Vec::with_capacity(rows.len());
    for (mark_id, subject) in rows {
        let eval = match calc::evaluate_subject(&subject, &scheme) {
            Ok(v) => v,
            Err(e) => return calc_err(&req.id, e),
        };
        subjects.push(json!({
            "markId": mark_id,
            "subjectName": subject.subject_name.clone(),
            "credits": subject.credits,
            "marks": subject.marks,
            "assumed": subject.assumed,
            "isGraded": subject.is_graded,
            "evaluation": eval
        }));
        bare.push(subject);
    }

    let summary = match calc::semester_summary(&bare, &scheme) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    ok(
        &req.id,
        json!({
            "semesterId": semester_id,
            "subjects": subjects,
            "sgpa": calc::round_off_2_decimals(summary.sgpa),
            "creditsForGpa": summary.credits_for_gpa,
            "totalCredits": summary.total_credits
        }),
    )
}

fn handle_marks_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let semester_id = match req.params.get("semesterId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing semesterId", None),
    };
    match helpers::semester_exists(conn, semester_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "semester not found", None),
        Err(e) => return calc_err(&req.id, e),
    }

    let Some(raw_subjects) = req.params.get("subjects").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing subjects array", None);
    };

    let mut subjects = Vec::with_capacity(raw_subjects.len());
    for (i, raw) in raw_subjects.iter().enumerate() {
        match serde_json::from_value::<Subject>(raw.clone()) {
            Ok(s) => subjects.push(s),
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("subjects[{}]: {}", i, e),
                    None,
                )
            }
        }
    }
    // Reject bad rows before touching the table; the replace is all or nothing.
    for s in &subjects {
        if s.credits < 0 {
            return err(
                &req.id,
                "validation_error",
                format!("subject '{}' has negative credits", s.subject_name),
                None,
            );
        }
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Err(e) = tx.execute("DELETE FROM subject_marks WHERE semester_id = ?", [semester_id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }

    for (i, s) in subjects.iter().enumerate() {
        let assumed_raw = match serde_json::to_string(&s.assumed) {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.rollback();
                return err(&req.id, "bad_params", e.to_string(), None);
            }
        };
        let (ov_grade, ov_points) = match &s.manual_override {
            Some(ov) => (Some(ov.grade.as_str()), Some(ov.points)),
            None => (None, None),
        };
        if let Err(e) = tx.execute(
            "INSERT INTO subject_marks(semester_id, subject_name, credits,
                                       continuous_mark, midterm_mark, final_mark,
                                       assumed_marks, is_graded,
                                       overridden_grade, overridden_points, sort_order)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                semester_id,
                &s.subject_name,
                s.credits,
                s.marks.continuous,
                s.marks.midterm,
                s.marks.final_exam,
                &assumed_raw,
                s.is_graded as i64,
                ov_grade,
                ov_points,
                i as i64,
            ),
        ) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "subject_marks" })),
            );
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    let summary = match helpers::recompute_semester(conn, semester_id) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    ok(
        &req.id,
        json!({
            "semesterId": semester_id,
            "savedSubjects": subjects.len(),
            "sgpa": calc::round_off_2_decimals(summary.sgpa),
            "creditsForGpa": summary.credits_for_gpa,
            "totalCredits": summary.total_credits
        }),
    )
}

fn handle_marks_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mark_id = match req.params.get("markId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing markId", None),
    };

    let semester_id: Option<i64> = match conn
        .query_row(
            "SELECT semester_id FROM subject_marks WHERE id = ?",
            [mark_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(semester_id) = semester_id else {
        return err(&req.id, "not_found", "subject mark not found", None);
    };

    if let Err(e) = conn.execute("DELETE FROM subject_marks WHERE id = ?", [mark_id]) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "subject_marks" })),
        );
    }

    let summary = match helpers::recompute_semester(conn, semester_id) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    ok(
        &req.id,
        json!({
            "semesterId": semester_id,
            "sgpa": calc::round_off_2_decimals(summary.sgpa),
            "totalCredits": summary.total_credits
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.list" => Some(handle_marks_list(state, req)),
        "marks.save" => Some(handle_marks_save(state, req)),
        "marks.delete" => Some(handle_marks_delete(state, req)),
        _ => None,
    }
}
