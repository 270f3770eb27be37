//! SQLite implementation of the commit and problem stores.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row, TransactionBehavior};

use crate::error::GrindError;
use crate::model::{Assignment, Commit, Problem, ProblemStep};
use crate::ports::store::{
    CommitStore, CommitTx, ProblemStore, SignedProblem, Signer, TxWork,
};

const COMMIT_COLUMNS: &str = "id, assignment_id, problem_step_number, user_id, action, closed, \
     comment, score, report_card, submission, transcript, created_at, updated_at";

/// Stores backed by one SQLite database.
///
/// The connection sits behind a mutex and every commit transaction begins
/// `IMMEDIATE`, so check-then-act sequences never interleave.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GrindError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GrindError::Storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self, GrindError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, GrindError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, GrindError> {
        self.conn.lock().map_err(|_| GrindError::Storage("connection lock poisoned".into()))
    }
}

fn migrate(conn: &Connection) -> Result<(), GrindError> {
    conn.execute_batch(
        r"
        PRAGMA foreign_keys=ON;

        CREATE TABLE IF NOT EXISTS assignments (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          user_id INTEGER NOT NULL,
          problem_id INTEGER NOT NULL,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS commits (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          assignment_id INTEGER NOT NULL REFERENCES assignments(id),
          problem_step_number INTEGER NOT NULL,
          user_id INTEGER NOT NULL,
          action TEXT NOT NULL,
          closed INTEGER NOT NULL,
          comment TEXT NOT NULL,
          score REAL NOT NULL,
          report_card TEXT,
          submission TEXT NOT NULL,
          transcript TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_commits_assignment ON commits(assignment_id, closed);
        CREATE INDEX IF NOT EXISTS idx_commits_owner ON commits(user_id, assignment_id, created_at);

        CREATE TABLE IF NOT EXISTS problems (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          unique_key TEXT NOT NULL UNIQUE,
          note TEXT NOT NULL,
          problem_type TEXT NOT NULL,
          tags TEXT NOT NULL,
          options TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          signature TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS problem_steps (
          problem_id INTEGER NOT NULL REFERENCES problems(id) ON DELETE CASCADE,
          step INTEGER NOT NULL,
          note TEXT NOT NULL,
          instructions TEXT NOT NULL,
          weight REAL NOT NULL,
          files TEXT NOT NULL,
          PRIMARY KEY (problem_id, step)
        );
        ",
    )?;
    Ok(())
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, GrindError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| GrindError::Storage(format!("bad timestamp {raw:?}: {e}")))
}

/// Raw column values; JSON and timestamp columns are decoded afterwards.
struct CommitRow {
    id: i64,
    assignment_id: i64,
    problem_step_number: i64,
    user_id: i64,
    action: String,
    closed: bool,
    comment: String,
    score: f64,
    report_card: Option<String>,
    submission: String,
    transcript: String,
    created_at: String,
    updated_at: String,
}

impl CommitRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            assignment_id: row.get(1)?,
            problem_step_number: row.get(2)?,
            user_id: row.get(3)?,
            action: row.get(4)?,
            closed: row.get(5)?,
            comment: row.get(6)?,
            score: row.get(7)?,
            report_card: row.get(8)?,
            submission: row.get(9)?,
            transcript: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_commit(self) -> Result<Commit, GrindError> {
        Ok(Commit {
            id: self.id,
            assignment_id: self.assignment_id,
            problem_step_number: self.problem_step_number,
            user_id: self.user_id,
            action: self.action,
            closed: self.closed,
            comment: self.comment,
            score: self.score,
            report_card: self.report_card.as_deref().map(serde_json::from_str).transpose()?,
            submission: serde_json::from_str(&self.submission)?,
            transcript: serde_json::from_str(&self.transcript)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn query_commits(
    conn: &Connection,
    filter: &str,
    params: impl Params,
) -> Result<Vec<Commit>, GrindError> {
    let sql = format!("SELECT {COMMIT_COLUMNS} FROM commits {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, CommitRow::read)?.collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(CommitRow::into_commit).collect()
}

fn query_commit(
    conn: &Connection,
    filter: &str,
    params: impl Params,
) -> Result<Option<Commit>, GrindError> {
    let sql = format!("SELECT {COMMIT_COLUMNS} FROM commits {filter}");
    conn.query_row(&sql, params, CommitRow::read).optional()?.map(CommitRow::into_commit).transpose()
}

fn write_commit(conn: &Connection, commit: &Commit) -> Result<i64, GrindError> {
    let report_card = commit.report_card.as_ref().map(serde_json::to_string).transpose()?;
    let submission = serde_json::to_string(&commit.submission)?;
    let transcript = serde_json::to_string(&commit.transcript)?;

    if commit.id == 0 {
        conn.execute(
            r"
            INSERT INTO commits(assignment_id, problem_step_number, user_id, action, closed,
                                comment, score, report_card, submission, transcript,
                                created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
            params![
                commit.assignment_id,
                commit.problem_step_number,
                commit.user_id,
                commit.action,
                commit.closed,
                commit.comment,
                commit.score,
                report_card,
                submission,
                transcript,
                timestamp(commit.created_at),
                timestamp(commit.updated_at),
            ],
        )?;
        return Ok(conn.last_insert_rowid());
    }

    let changed = conn.execute(
        r"
        UPDATE commits
        SET assignment_id = ?2, problem_step_number = ?3, user_id = ?4, action = ?5,
            closed = ?6, comment = ?7, score = ?8, report_card = ?9, submission = ?10,
            transcript = ?11, created_at = ?12, updated_at = ?13
        WHERE id = ?1
        ",
        params![
            commit.id,
            commit.assignment_id,
            commit.problem_step_number,
            commit.user_id,
            commit.action,
            commit.closed,
            commit.comment,
            commit.score,
            report_card,
            submission,
            transcript,
            timestamp(commit.created_at),
            timestamp(commit.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(GrindError::Storage(format!("commit {} disappeared during update", commit.id)));
    }
    Ok(commit.id)
}

/// Commit transaction over a borrowed SQLite transaction.
struct SqliteTx<'c> {
    conn: &'c Connection,
}

impl CommitTx for SqliteTx<'_> {
    fn find_assignment(
        &mut self,
        assignment_id: i64,
        user_id: i64,
    ) -> Result<Option<Assignment>, GrindError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, user_id, problem_id, created_at FROM assignments \
                 WHERE id = ?1 AND user_id = ?2",
                params![assignment_id, user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, user_id, problem_id, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(Assignment { id, user_id, problem_id, created_at: parse_timestamp(&created_at)? }))
    }

    fn open_commit(&mut self, assignment_id: i64) -> Result<Option<Commit>, GrindError> {
        query_commit(
            self.conn,
            "WHERE assignment_id = ?1 AND closed = 0 ORDER BY updated_at DESC, id DESC LIMIT 1",
            params![assignment_id],
        )
    }

    fn save_commit(&mut self, commit: &Commit) -> Result<i64, GrindError> {
        write_commit(self.conn, commit)
    }
}

impl CommitStore for SqliteStore {
    fn in_transaction(&self, work: &mut TxWork<'_>) -> Result<(), GrindError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        work(&mut SqliteTx { conn: &tx })?;
        tx.commit()?;
        Ok(())
    }

    fn create_assignment(
        &self,
        user_id: i64,
        problem_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Assignment, GrindError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO assignments(user_id, problem_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, problem_id, timestamp(now)],
        )?;
        Ok(Assignment { id: conn.last_insert_rowid(), user_id, problem_id, created_at: now })
    }

    fn list_commits(&self, user_id: i64, assignment_id: i64) -> Result<Vec<Commit>, GrindError> {
        let conn = self.lock()?;
        query_commits(
            &conn,
            "WHERE user_id = ?1 AND assignment_id = ?2 ORDER BY created_at, id",
            params![user_id, assignment_id],
        )
    }

    fn last_commit(
        &self,
        user_id: i64,
        assignment_id: i64,
    ) -> Result<Option<Commit>, GrindError> {
        let conn = self.lock()?;
        query_commit(
            &conn,
            "WHERE user_id = ?1 AND assignment_id = ?2 ORDER BY created_at DESC, id DESC LIMIT 1",
            params![user_id, assignment_id],
        )
    }

    fn get_commit(
        &self,
        user_id: i64,
        assignment_id: i64,
        commit_id: i64,
    ) -> Result<Option<Commit>, GrindError> {
        let conn = self.lock()?;
        query_commit(
            &conn,
            "WHERE id = ?1 AND user_id = ?2 AND assignment_id = ?3",
            params![commit_id, user_id, assignment_id],
        )
    }

    fn delete_commit(
        &self,
        user_id: i64,
        assignment_id: i64,
        commit_id: i64,
    ) -> Result<bool, GrindError> {
        let removed = self.lock()?.execute(
            "DELETE FROM commits WHERE id = ?1 AND user_id = ?2 AND assignment_id = ?3",
            params![commit_id, user_id, assignment_id],
        )?;
        Ok(removed > 0)
    }

    fn delete_commits(&self, user_id: i64, assignment_id: i64) -> Result<usize, GrindError> {
        Ok(self.lock()?.execute(
            "DELETE FROM commits WHERE user_id = ?1 AND assignment_id = ?2",
            params![user_id, assignment_id],
        )?)
    }
}

impl ProblemStore for SqliteStore {
    fn save_problem(
        &self,
        problem: &mut Problem,
        steps: &mut [ProblemStep],
        sign: &Signer<'_>,
    ) -> Result<String, GrindError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut signed = problem.clone();
        let mut signed_steps = steps.to_vec();
        let tags = serde_json::to_string(&signed.tags)?;
        let options = serde_json::to_string(&signed.options)?;
        let created_at = timestamp(signed.created_at);
        let updated_at = timestamp(signed.updated_at);

        if signed.id == 0 {
            tx.execute(
                "INSERT INTO problems(unique_key, note, problem_type, tags, options, \
                 created_at, updated_at, signature) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '')",
                params![
                    signed.unique,
                    signed.note,
                    signed.problem_type,
                    tags,
                    options,
                    created_at,
                    updated_at,
                ],
            )?;
            signed.id = tx.last_insert_rowid();
        } else {
            tx.execute(
                "INSERT INTO problems(id, unique_key, note, problem_type, tags, options, \
                 created_at, updated_at, signature) VALUES (?8, ?1, ?2, ?3, ?4, ?5, ?6, ?7, '') \
                 ON CONFLICT(id) DO UPDATE SET unique_key = ?1, note = ?2, problem_type = ?3, \
                 tags = ?4, options = ?5, created_at = ?6, updated_at = ?7",
                params![
                    signed.unique,
                    signed.note,
                    signed.problem_type,
                    tags,
                    options,
                    created_at,
                    updated_at,
                    signed.id,
                ],
            )?;
        }

        tx.execute("DELETE FROM problem_steps WHERE problem_id = ?1", params![signed.id])?;
        for step in &mut signed_steps {
            step.problem_id = signed.id;
            tx.execute(
                "INSERT INTO problem_steps(problem_id, step, note, instructions, weight, files) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    step.problem_id,
                    step.step,
                    step.note,
                    step.instructions,
                    step.weight,
                    serde_json::to_string(&step.files)?,
                ],
            )?;
        }

        let signature = sign(&signed, &signed_steps)?;
        tx.execute(
            "UPDATE problems SET signature = ?1 WHERE id = ?2",
            params![signature, signed.id],
        )?;
        tx.commit()?;
        *problem = signed;
        steps.clone_from_slice(&signed_steps);
        Ok(signature)
    }

    fn load_problem(&self, problem_id: i64) -> Result<Option<SignedProblem>, GrindError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT unique_key, note, problem_type, tags, options, created_at, updated_at, \
                 signature FROM problems WHERE id = ?1",
                params![problem_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;
        let Some((unique, note, problem_type, tags, options, created_at, updated_at, signature)) =
            row
        else {
            return Ok(None);
        };

        let problem = Problem {
            id: problem_id,
            unique,
            note,
            problem_type,
            tags: serde_json::from_str(&tags)?,
            options: serde_json::from_str(&options)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        };

        let mut stmt = conn.prepare(
            "SELECT step, note, instructions, weight, files FROM problem_steps \
             WHERE problem_id = ?1 ORDER BY step",
        )?;
        let raw = stmt
            .query_map(params![problem_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let steps = raw
            .into_iter()
            .map(|(step, note, instructions, weight, files)| {
                Ok(ProblemStep {
                    problem_id,
                    step,
                    note,
                    instructions,
                    weight,
                    files: serde_json::from_str(&files)?,
                })
            })
            .collect::<Result<Vec<_>, GrindError>>()?;

        Ok(Some(SignedProblem { problem, steps, signature }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn commit(assignment_id: i64, user_id: i64, created: &str) -> Commit {
        Commit {
            id: 0,
            assignment_id,
            problem_step_number: 1,
            user_id,
            action: String::new(),
            closed: false,
            comment: "c".into(),
            score: 0.0,
            report_card: None,
            submission: [("main.py".to_string(), "print(1)\n".to_string())].into(),
            transcript: Vec::new(),
            created_at: at(created),
            updated_at: at(created),
        }
    }

    #[test]
    fn commit_rows_round_trip_through_a_transaction() {
        let store = SqliteStore::open_in_memory().unwrap();
        let assignment = store.create_assignment(7, 1, at("2024-01-01T00:00:00Z")).unwrap();

        let mut saved = commit(assignment.id, 7, "2024-01-01T00:00:00.123456789Z");
        store
            .in_transaction(&mut |tx| {
                assert!(tx.find_assignment(assignment.id, 7)?.is_some());
                assert!(tx.find_assignment(assignment.id, 8)?.is_none());
                saved.id = tx.save_commit(&saved)?;
                Ok(())
            })
            .unwrap();
        assert!(saved.id > 0);

        let loaded = store.get_commit(7, assignment.id, saved.id).unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(store.get_commit(8, assignment.id, saved.id).unwrap().is_none());
    }

    #[test]
    fn failed_work_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let assignment = store.create_assignment(7, 1, at("2024-01-01T00:00:00Z")).unwrap();

        let result = store.in_transaction(&mut |tx| {
            tx.save_commit(&commit(assignment.id, 7, "2024-01-01T00:00:00Z"))?;
            Err(GrindError::Storage("disk on fire".into()))
        });
        assert!(result.is_err());
        assert!(store.list_commits(7, assignment.id).unwrap().is_empty());
    }

    #[test]
    fn listing_orders_by_creation_and_deletes_are_scoped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_assignment(7, 1, at("2024-01-01T00:00:00Z")).unwrap();
        store
            .in_transaction(&mut |tx| {
                tx.save_commit(&commit(a.id, 7, "2024-01-03T00:00:00Z"))?;
                tx.save_commit(&commit(a.id, 7, "2024-01-02T00:00:00Z"))?;
                tx.save_commit(&commit(a.id, 8, "2024-01-04T00:00:00Z"))?;
                Ok(())
            })
            .unwrap();

        let listed = store.list_commits(7, a.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at < listed[1].created_at);
        let last = store.last_commit(7, a.id).unwrap().unwrap();
        assert_eq!(last.created_at, at("2024-01-03T00:00:00Z"));

        assert!(!store.delete_commit(8, a.id, listed[0].id).unwrap());
        assert!(store.delete_commit(7, a.id, listed[0].id).unwrap());
        assert_eq!(store.delete_commits(7, a.id).unwrap(), 1);
        assert!(store.last_commit(7, a.id).unwrap().is_none());
        assert_eq!(store.list_commits(8, a.id).unwrap().len(), 1);
    }

    #[test]
    fn problems_are_stored_with_ids_and_signature() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut problem = Problem {
            id: 0,
            unique: "hello".into(),
            note: "Hello".into(),
            problem_type: "python3unittest".into(),
            tags: vec!["a".into()],
            options: Vec::new(),
            created_at: at("2020-01-01T00:00:00Z"),
            updated_at: at("2020-01-01T00:00:00Z"),
        };
        let mut steps = vec![ProblemStep {
            problem_id: 0,
            step: 1,
            note: "one".into(),
            instructions: "<p>hi</p>".into(),
            weight: 1.0,
            files: [("main.py".to_string(), "x\n".to_string())].into(),
        }];

        let signature = store
            .save_problem(&mut problem, &mut steps, &|p, s| Ok(format!("{}:{}", p.id, s.len())))
            .unwrap();
        assert!(problem.id > 0);
        assert_eq!(steps[0].problem_id, problem.id);
        assert_eq!(signature, format!("{}:1", problem.id));

        let loaded = store.load_problem(problem.id).unwrap().unwrap();
        assert_eq!(loaded.problem, problem);
        assert_eq!(loaded.steps, steps);
        assert_eq!(loaded.signature, signature);
        assert!(store.load_problem(problem.id + 1).unwrap().is_none());
    }

    #[test]
    fn failing_signer_leaves_no_problem_behind() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut problem = Problem {
            id: 0,
            unique: "bad".into(),
            note: "Bad".into(),
            problem_type: "t".into(),
            tags: Vec::new(),
            options: Vec::new(),
            created_at: at("2020-01-01T00:00:00Z"),
            updated_at: at("2020-01-01T00:00:00Z"),
        };
        let err = store
            .save_problem(&mut problem, &mut [], &|_, _| {
                Err(GrindError::Integrity("no key".into()))
            })
            .unwrap_err();
        assert!(matches!(err, GrindError::Integrity(_)));
        assert_eq!(problem.id, 0);
        assert!(store.load_problem(1).unwrap().is_none());
    }
}
