use crate::calc::{GradeCutoff, GradingScheme};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

fn cutoffs_from_params(req: &Request) -> Result<Option<Vec<GradeCutoff>>, serde_json::Value> {
    let Some(raw) = req.params.get("cutoffs") else {
        return Ok(None);
    };
    match serde_json::from_value::<Vec<GradeCutoff>>(raw.clone()) {
        Ok(v) => Ok(Some(v)),
        Err(e) => Err(err(
            &req.id,
            "bad_params",
            format!("cutoffs must be [{{grade, minTotal}}]: {}", e),
            None,
        )),
    }
}

fn handle_schemes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "schemes": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT id, scheme_name, grade_cutoffs, is_default
         FROM grading_schemes
         ORDER BY is_default DESC, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let scheme_name: String = row.get(1)?;
            let cutoffs_raw: String = row.get(2)?;
            let is_default: i64 = row.get(3)?;
            Ok((id, scheme_name, cutoffs_raw, is_default))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    let rows = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut schemes = Vec::with_capacity(rows.len());
    for (id, scheme_name, cutoffs_raw, is_default) in rows {
        let cutoffs = match helpers::parse_cutoffs(&cutoffs_raw) {
            Ok(v) => v,
            Err(e) => return calc_err(&req.id, e),
        };
        schemes.push(json!({
            "schemeId": id,
            "schemeName": scheme_name,
            "cutoffs": cutoffs,
            "isDefault": is_default != 0
        }));
    }

    ok(&req.id, json!({ "schemes": schemes }))
}

fn handle_schemes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let scheme_name = match req.params.get("schemeName").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing schemeName", None),
    };
    if scheme_name.is_empty() {
        return err(&req.id, "bad_params", "schemeName must not be empty", None);
    }

    let cutoffs = match cutoffs_from_params(req) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing cutoffs", None),
        Err(resp) => return resp,
    };

    let scheme = GradingScheme {
        scheme_name: scheme_name.clone(),
        cutoffs,
        is_default: false,
    };
    if let Err(e) = scheme.validate() {
        return calc_err(&req.id, e);
    }

    let cutoffs_raw = match serde_json::to_string(&scheme.cutoffs) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    if let Err(e) = conn.execute(
        "INSERT INTO grading_schemes(scheme_name, grade_cutoffs, is_default, created_at)
         VALUES(?, ?, 0, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&scheme_name, &cutoffs_raw),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "grading_schemes" })),
        );
    }

    let scheme_id = conn.last_insert_rowid();
    ok(
        &req.id,
        json!({ "schemeId": scheme_id, "schemeName": scheme_name }),
    )
}

fn handle_schemes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let scheme_id = match req.params.get("schemeId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing schemeId", None),
    };

    let existing: Option<(String, String)> = match conn
        .query_row(
            "SELECT scheme_name, grade_cutoffs FROM grading_schemes WHERE id = ?",
            [scheme_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((current_name, current_cutoffs)) = existing else {
        return err(&req.id, "not_found", "grading scheme not found", None);
    };

    let scheme_name = req
        .params
        .get("schemeName")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(current_name);

    let cutoffs = match cutoffs_from_params(req) {
        Ok(Some(v)) => v,
        Ok(None) => match helpers::parse_cutoffs(&current_cutoffs) {
            Ok(v) => v,
            Err(e) => return calc_err(&req.id, e),
        },
        Err(resp) => return resp,
    };

    let scheme = GradingScheme {
        scheme_name: scheme_name.clone(),
        cutoffs,
        is_default: false,
    };
    if let Err(e) = scheme.validate() {
        return calc_err(&req.id, e);
    }

    let cutoffs_raw = match serde_json::to_string(&scheme.cutoffs) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    if let Err(e) = conn.execute(
        "UPDATE grading_schemes SET scheme_name = ?, grade_cutoffs = ? WHERE id = ?",
        (&scheme_name, &cutoffs_raw, scheme_id),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({ "schemeId": scheme_id, "schemeName": scheme_name }),
    )
}

fn handle_schemes_set_default(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let scheme_id = match req.params.get("schemeId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing schemeId", None),
    };

    let exists: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM grading_schemes WHERE id = ?",
            [scheme_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "grading scheme not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Exactly one default at a time.
    if let Err(e) = tx.execute("UPDATE grading_schemes SET is_default = 0", []) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = tx.execute(
        "UPDATE grading_schemes SET is_default = 1 WHERE id = ?",
        [scheme_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "schemeId": scheme_id, "isDefault": true }))
}

fn handle_schemes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let scheme_id = match req.params.get("schemeId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing schemeId", None),
    };

    let row: Option<i64> = match conn
        .query_row(
            "SELECT is_default FROM grading_schemes WHERE id = ?",
            [scheme_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(is_default) = row else {
        return err(&req.id, "not_found", "grading scheme not found", None);
    };
    if is_default != 0 {
        return err(
            &req.id,
            "bad_params",
            "cannot delete the default grading scheme",
            None,
        );
    }

    // Templates referencing the scheme keep it alive.
    let referenced: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM subject_templates WHERE grading_scheme_id = ?",
        [scheme_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if referenced > 0 {
        return err(
            &req.id,
            "bad_params",
            "scheme is referenced by subject templates",
            Some(json!({ "templateCount": referenced })),
        );
    }

    if let Err(e) = conn.execute("DELETE FROM grading_schemes WHERE id = ?", [scheme_id]) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "grading_schemes" })),
        );
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schemes.list" => Some(handle_schemes_list(state, req)),
        "schemes.create" => Some(handle_schemes_create(state, req)),
        "schemes.update" => Some(handle_schemes_update(state, req)),
        "schemes.setDefault" => Some(handle_schemes_set_default(state, req)),
        "schemes.delete" => Some(handle_schemes_delete(state, req)),
        _ => None,
    }
}
