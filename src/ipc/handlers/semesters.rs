use crate::calc;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

/// Copy matching subject templates into a semester as blank mark rows.
/// The template table is a read-only seed source; edits after seeding stay
/// local to the semester.
fn seed_from_templates(
    conn: &Connection,
    semester_id: i64,
    year: i64,
    term: i64,
    branch: &str,
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "SELECT subject_name, default_credits FROM subject_templates
         WHERE year = ? AND term = ? AND branch = ?
         ORDER BY subject_name",
    )?;
    let templates = stmt
        .query_map((year, term, branch), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (i, (subject_name, credits)) in templates.iter().enumerate() {
        conn.execute(
            "INSERT INTO subject_marks(semester_id, subject_name, credits,
                                       continuous_mark, midterm_mark, final_mark,
                                       assumed_marks, is_graded,
                                       overridden_grade, overridden_points, sort_order)
             VALUES(?, ?, ?, NULL, NULL, NULL, NULL, 1, NULL, NULL, ?)",
            (semester_id, subject_name, credits, i as i64),
        )?;
    }
    Ok(templates.len())
}

fn handle_semesters_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "semesters": [] }));
    };

    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };

    let mut stmt = match conn.prepare(
        "SELECT id, title, year, term, branch, calculated_sgpa, total_credits, created_at
         FROM semesters
         WHERE user_id = ?
         ORDER BY year, term, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&user_id], |row| {
            let id: i64 = row.get(0)?;
            let title: Option<String> = row.get(1)?;
            let year: i64 = row.get(2)?;
            let term: i64 = row.get(3)?;
            let branch: String = row.get(4)?;
            let sgpa: Option<f64> = row.get(5)?;
            let total_credits: Option<i64> = row.get(6)?;
            let created_at: Option<String> = row.get(7)?;
            Ok(json!({
                "semesterId": id,
                "title": title,
                "year": year,
                "term": term,
                "branch": branch,
                "sgpa": sgpa,
                "totalCredits": total_credits,
                "createdAt": created_at
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(semesters) => ok(&req.id, json!({ "semesters": semesters })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_semesters_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };
    let year = match req.params.get("year").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing year", None),
    };
    let term = match req.params.get("term").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing term", None),
    };
    let branch = match req.params.get("branch").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing branch", None),
    };
    let title = req
        .params
        .get("title")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("Year {} Term {}", year, term));

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Err(e) = tx.execute(
        "INSERT INTO semesters(user_id, title, year, term, branch, calculated_sgpa, total_credits, created_at)
         VALUES(?, ?, ?, ?, ?, NULL, NULL, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&user_id, &title, year, term, &branch),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "semesters" })),
        );
    }
    let semester_id = tx.last_insert_rowid();

    let seeded = match seed_from_templates(&tx, semester_id, year, term, &branch) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "subject_marks" })),
            );
        }
    };

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "semesterId": semester_id,
            "title": title,
            "seededSubjects": seeded
        }),
    )
}

fn handle_semesters_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let semester_id = match req.params.get("semesterId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing semesterId", None),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch object", None);
    };

    match helpers::semester_exists(conn, semester_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "semester not found", None),
        Err(e) => return calc_err(&req.id, e),
    }

    if let Some(title) = patch
        .get("title")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if let Err(e) = conn.execute(
            "UPDATE semesters SET title = ? WHERE id = ?",
            (title, semester_id),
        ) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }
    for key in ["year", "term"] {
        if let Some(v) = patch.get(key).and_then(|v| v.as_i64()) {
            let sql = format!("UPDATE semesters SET {} = ? WHERE id = ?", key);
            if let Err(e) = conn.execute(&sql, (v, semester_id)) {
                return err(&req.id, "db_update_failed", e.to_string(), None);
            }
        }
    }
    if let Some(branch) = patch
        .get("branch")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if let Err(e) = conn.execute(
            "UPDATE semesters SET branch = ? WHERE id = ?",
            (branch, semester_id),
        ) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }

    ok(&req.id, json!({ "semesterId": semester_id }))
}

fn handle_semesters_reset_template(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let semester_id = match req.params.get("semesterId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing semesterId", None),
    };

    let row: Option<(i64, i64, String)> = match conn
        .query_row(
            "SELECT year, term, branch FROM semesters WHERE id = ?",
            [semester_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((year, term, branch)) = row else {
        return err(&req.id, "not_found", "semester not found", None);
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Err(e) = tx.execute("DELETE FROM subject_marks WHERE semester_id = ?", [semester_id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    let seeded = match seed_from_templates(&tx, semester_id, year, term, &branch) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
    };
    // A freshly reset semester has no marks, so the stored aggregates clear.
    if let Err(e) = tx.execute(
        "UPDATE semesters SET calculated_sgpa = NULL, total_credits = NULL WHERE id = ?",
        [semester_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({ "semesterId": semester_id, "seededSubjects": seeded }),
    )
}

fn handle_semesters_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Marks first, then the semester row.
    if let Err(e) = tx.execute("DELETE FROM subject_marks WHERE semester_id = ?", [semester_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "subject_marks" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM semesters WHERE id = ?", [semester_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "semesters" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

fn handle_record_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };

    let mut stmt = match conn.prepare(
        "SELECT calculated_sgpa, total_credits FROM semesters
         WHERE user_id = ? AND calculated_sgpa IS NOT NULL AND total_credits IS NOT NULL
         ORDER BY year, term, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let weights = stmt
        .query_map([&user_id], |r| {
            Ok(calc::SemesterWeight {
                sgpa: r.get(0)?,
                total_credits: r.get(1)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    let weights = match weights {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let cgpa = calc::cumulative_gpa(&weights);
    let total_credits: i64 = weights.iter().map(|w| w.total_credits).sum();
    let latest_sgpa = weights.last().map(|w| w.sgpa);

    ok(
        &req.id,
        json!({
            "userId": user_id,
            "cgpa": calc::round_off_2_decimals(cgpa),
            "totalCredits": total_credits,
            "latestSgpa": latest_sgpa,
            "semesterCount": weights.len()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "semesters.list" => Some(handle_semesters_list(state, req)),
        "semesters.create" => Some(handle_semesters_create(state, req)),
        "semesters.update" => Some(handle_semesters_update(state, req)),
        "semesters.resetTemplate" => Some(handle_semesters_reset_template(state, req)),
        "semesters.delete" => Some(handle_semesters_delete(state, req)),
        "record.summary" => Some(handle_record_summary(state, req)),
        _ => None,
    }
}
