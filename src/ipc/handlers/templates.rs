use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

fn handle_templates_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "templates": [] }));
    };

    let year = req.params.get("year").and_then(|v| v.as_i64());
    let term = req.params.get("term").and_then(|v| v.as_i64());
    let branch = req
        .params
        .get("branch")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let mut stmt = match conn.prepare(
        "SELECT id, subject_name, default_credits, year, term, branch, grading_scheme_id
         FROM subject_templates
         WHERE (?1 IS NULL OR year = ?1)
           AND (?2 IS NULL OR term = ?2)
           AND (?3 IS NULL OR branch = ?3)
         ORDER BY year, term, branch, subject_name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map((year, term, branch.as_deref()), |row| {
            let id: i64 = row.get(0)?;
            let subject_name: String = row.get(1)?;
            let default_credits: i64 = row.get(2)?;
            let year: i64 = row.get(3)?;
            let term: i64 = row.get(4)?;
            let branch: String = row.get(5)?;
            let grading_scheme_id: Option<i64> = row.get(6)?;
            Ok(json!({
                "templateId": id,
                "subjectName": subject_name,
                "defaultCredits": default_credits,
                "year": year,
                "term": term,
                "branch": branch,
                "gradingSchemeId": grading_scheme_id
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(templates) => ok(&req.id, json!({ "templates": templates })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_templates_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };
    if let Err(e) = helpers::require_admin(conn, &user_id) {
        return calc_err(&req.id, e);
    }

    let subject_name = match req.params.get("subjectName").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing subjectName", None),
    };
    if subject_name.is_empty() {
        return err(&req.id, "bad_params", "subjectName must not be empty", None);
    }

    let default_credits = match req.params.get("defaultCredits").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing defaultCredits", None),
    };
    if default_credits < 0 {
        return err(
            &req.id,
            "validation_error",
            "defaultCredits must not be negative",
            None,
        );
    }

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

    let grading_scheme_id = req.params.get("gradingSchemeId").and_then(|v| v.as_i64());
    if let Some(sid) = grading_scheme_id {
        let exists: Option<i64> = match conn
            .query_row("SELECT 1 FROM grading_schemes WHERE id = ?", [sid], |r| {
                r.get(0)
            })
            .optional()
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        if exists.is_none() {
            return err(&req.id, "not_found", "grading scheme not found", None);
        }
    }

    if let Err(e) = conn.execute(
        "INSERT INTO subject_templates(subject_name, default_credits, year, term, branch, grading_scheme_id)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &subject_name,
            default_credits,
            year,
            term,
            &branch,
            grading_scheme_id,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subject_templates" })),
        );
    }

    ok(
        &req.id,
        json!({ "templateId": conn.last_insert_rowid(), "subjectName": subject_name }),
    )
}

fn handle_templates_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };
    if let Err(e) = helpers::require_admin(conn, &user_id) {
        return calc_err(&req.id, e);
    }

    let template_id = match req.params.get("templateId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing templateId", None),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch object", None);
    };

    let exists: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM subject_templates WHERE id = ?",
            [template_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "subject template not found", None);
    }

    if let Some(credits) = patch.get("defaultCredits").and_then(|v| v.as_i64()) {
        if credits < 0 {
            return err(
                &req.id,
                "validation_error",
                "defaultCredits must not be negative",
                None,
            );
        }
        if let Err(e) = conn.execute(
            "UPDATE subject_templates SET default_credits = ? WHERE id = ?",
            (credits, template_id),
        ) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }
    if let Some(name) = patch
        .get("subjectName")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if let Err(e) = conn.execute(
            "UPDATE subject_templates SET subject_name = ? WHERE id = ?",
            (name, template_id),
        ) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }
    for key in ["year", "term"] {
        if let Some(v) = patch.get(key).and_then(|v| v.as_i64()) {
            let sql = format!("UPDATE subject_templates SET {} = ? WHERE id = ?", key);
            if let Err(e) = conn.execute(&sql, (v, template_id)) {
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
            "UPDATE subject_templates SET branch = ? WHERE id = ?",
            (branch, template_id),
        ) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }
    if let Some(v) = patch.get("gradingSchemeId") {
        let scheme_id = v.as_i64();
        if v.is_null() || scheme_id.is_some() {
            if let Err(e) = conn.execute(
                "UPDATE subject_templates SET grading_scheme_id = ? WHERE id = ?",
                (scheme_id, template_id),
            ) {
                return err(&req.id, "db_update_failed", e.to_string(), None);
            }
        }
    }

    ok(&req.id, json!({ "templateId": template_id }))
}

fn handle_templates_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };
    if let Err(e) = helpers::require_admin(conn, &user_id) {
        return calc_err(&req.id, e);
    }

    let template_id = match req.params.get("templateId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing templateId", None),
    };

    let deleted = match conn.execute("DELETE FROM subject_templates WHERE id = ?", [template_id]) {
        Ok(n) => n,
        Err(e) => {
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "subject_templates" })),
            )
        }
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "subject template not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "templates.list" => Some(handle_templates_list(state, req)),
        "templates.create" => Some(handle_templates_create(state, req)),
        "templates.update" => Some(handle_templates_update(state, req)),
        "templates.delete" => Some(handle_templates_delete(state, req)),
        _ => None,
    }
}
