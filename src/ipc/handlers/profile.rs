use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::OptionalExtension;
use serde_json::json;

fn handle_profile_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };

    let row: Option<(Option<String>, Option<String>, Option<String>, String)> = match conn
        .query_row(
            "SELECT full_name, college_name, enrollment_no, role FROM profiles WHERE id = ?",
            [&user_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Callers without a stored profile are plain students; the identity
    // provider owns account existence, not this store.
    let (full_name, college_name, enrollment_no, role) =
        row.unwrap_or((None, None, None, "student".to_string()));

    ok(
        &req.id,
        json!({
            "userId": user_id,
            "fullName": full_name,
            "collegeName": college_name,
            "enrollmentNo": enrollment_no,
            "role": role
        }),
    )
}

fn handle_profile_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch object", None);
    };
    // The role column is never client-writable; admin role is granted out of
    // band (directly in the store).
    if patch.contains_key("role") {
        return err(&req.id, "bad_params", "role is not updatable", None);
    }

    let text_field = |key: &str| -> Option<String> {
        patch
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let full_name = text_field("fullName");
    let college_name = text_field("collegeName");
    let enrollment_no = text_field("enrollmentNo");

    let now = Utc::now().to_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO profiles(id, full_name, college_name, enrollment_no, role, updated_at)
         VALUES(?, ?, ?, ?, 'student', ?)
         ON CONFLICT(id) DO UPDATE SET
           full_name = COALESCE(excluded.full_name, full_name),
           college_name = COALESCE(excluded.college_name, college_name),
           enrollment_no = COALESCE(excluded.enrollment_no, enrollment_no),
           updated_at = excluded.updated_at",
        (
            &user_id,
            full_name.as_deref(),
            college_name.as_deref(),
            enrollment_no.as_deref(),
            &now,
        ),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    match helpers::user_role(conn, &user_id) {
        Ok(role) => ok(&req.id, json!({ "userId": user_id, "role": role })),
        Err(e) => calc_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profile.get" => Some(handle_profile_get(state, req)),
        "profile.update" => Some(handle_profile_update(state, req)),
        _ => None,
    }
}
