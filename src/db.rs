use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("gradetrack.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS profiles(
            id TEXT PRIMARY KEY,
            full_name TEXT,
            college_name TEXT,
            enrollment_no TEXT,
            role TEXT NOT NULL DEFAULT 'student',
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grading_schemes(
            id INTEGER PRIMARY KEY,
            scheme_name TEXT NOT NULL,
            grade_cutoffs TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_templates(
            id INTEGER PRIMARY KEY,
            subject_name TEXT NOT NULL,
            default_credits INTEGER NOT NULL,
            year INTEGER NOT NULL,
            term INTEGER NOT NULL,
            branch TEXT NOT NULL,
            grading_scheme_id INTEGER,
            FOREIGN KEY(grading_scheme_id) REFERENCES grading_schemes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subject_templates_slot
         ON subject_templates(year, term, branch)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS semesters(
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            year INTEGER NOT NULL,
            term INTEGER NOT NULL,
            branch TEXT NOT NULL,
            calculated_sgpa REAL,
            total_credits INTEGER,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_semesters_user ON semesters(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_marks(
            id INTEGER PRIMARY KEY,
            semester_id INTEGER NOT NULL,
            subject_name TEXT NOT NULL,
            credits INTEGER NOT NULL,
            continuous_mark REAL,
            midterm_mark REAL,
            final_mark REAL,
            assumed_marks TEXT,
            is_graded INTEGER NOT NULL DEFAULT 1,
            overridden_grade TEXT,
            overridden_points REAL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(semester_id) REFERENCES semesters(id)
        )",
        [],
    )?;
    ensure_subject_marks_sort_order(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subject_marks_semester
         ON subject_marks(semester_id, sort_order)",
        [],
    )?;

    seed_default_scheme(&conn)?;

    Ok(conn)
}

/// Baseline cutoff table installed into fresh workspaces. Admins can add
/// schemes and move the default flag afterwards.
pub const DEFAULT_SCHEME_NAME: &str = "Standard 10-point";
pub const DEFAULT_SCHEME_CUTOFFS: &str =
    r#"[{"grade":"A+","minTotal":85.0},{"grade":"A","minTotal":75.0},{"grade":"B+","minTotal":65.0},{"grade":"B","minTotal":55.0},{"grade":"C","minTotal":50.0},{"grade":"P","minTotal":45.0},{"grade":"P-","minTotal":40.0},{"grade":"F","minTotal":0.0}]"#;

fn seed_default_scheme(conn: &Connection) -> anyhow::Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM grading_schemes", [], |r| r.get(0))?;
    if count > 0 {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO grading_schemes(scheme_name, grade_cutoffs, is_default, created_at)
         VALUES(?, ?, 1, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (DEFAULT_SCHEME_NAME, DEFAULT_SCHEME_CUTOFFS),
    )?;
    Ok(())
}

fn ensure_subject_marks_sort_order(conn: &Connection) -> anyhow::Result<()> {
    // Early workspaces stored marks without an explicit order. Add the column
    // and backfill from insert order.
    if table_has_column(conn, "subject_marks", "sort_order")? {
        return Ok(());
    }

    conn.execute(
        "ALTER TABLE subject_marks ADD COLUMN sort_order INTEGER NOT NULL DEFAULT 0",
        [],
    )?;

    let mut sem_stmt = conn.prepare("SELECT id FROM semesters ORDER BY rowid")?;
    let semester_ids = sem_stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut marks_stmt =
        conn.prepare("SELECT id FROM subject_marks WHERE semester_id = ? ORDER BY rowid")?;

    for sid in semester_ids {
        let mark_ids = marks_stmt
            .query_map([sid], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for (i, mid) in mark_ids.iter().enumerate() {
            conn.execute(
                "UPDATE subject_marks SET sort_order = ? WHERE id = ?",
                (i as i64, mid),
            )?;
        }
    }

    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
