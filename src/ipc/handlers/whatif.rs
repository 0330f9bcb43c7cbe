use crate::calc::{self, Subject};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};

fn handle_whatif_predict(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let semester_id = match req.params.get("semesterId").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing semesterId", None),
    };
    let target = match req.params.get("target").and_then(|v| v.as_f64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing target", None),
    };

    match helpers::semester_exists(conn, semester_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "semester not found", None),
        Err(e) => return calc_err(&req.id, e),
    }

    let subjects: Vec<Subject> = match helpers::load_subjects(conn, semester_id) {
        Ok(v) => v.into_iter().map(|(_, s)| s).collect(),
        Err(e) => return calc_err(&req.id, e),
    };
    let scheme = match helpers::load_scheme(conn, None) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    match calc::solve_what_if(target, &subjects, &scheme) {
        Ok(outcome) => match serde_json::to_value(&outcome) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "bad_params", e.to_string(), None),
        },
        Err(e) => calc_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "whatif.predict" => Some(handle_whatif_predict(state, req)),
        _ => None,
    }
}
