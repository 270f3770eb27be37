//! In-memory stores and a hand-driven clock.
//!
//! Store transactions run against a copy of the state that replaces the
//! original only when the work succeeds.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::GrindError;
use crate::model::{Assignment, Commit, Problem, ProblemStep};
use crate::ports::clock::Clock;
use crate::ports::store::{
    CommitStore, CommitTx, ProblemStore, SignedProblem, Signer, TxWork,
};

#[derive(Debug, Clone, Default)]
struct State {
    assignments: BTreeMap<i64, Assignment>,
    commits: BTreeMap<i64, Commit>,
    problems: BTreeMap<i64, SignedProblem>,
    last_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn owned_commits(&self, user_id: i64, assignment_id: i64) -> Vec<Commit> {
        let mut commits: Vec<Commit> = self
            .commits
            .values()
            .filter(|c| c.user_id == user_id && c.assignment_id == assignment_id)
            .cloned()
            .collect();
        commits.sort_by_key(|c| (c.created_at, c.id));
        commits
    }
}

impl CommitTx for State {
    fn find_assignment(
        &mut self,
        assignment_id: i64,
        user_id: i64,
    ) -> Result<Option<Assignment>, GrindError> {
        Ok(self.assignments.get(&assignment_id).filter(|a| a.user_id == user_id).cloned())
    }

    fn open_commit(&mut self, assignment_id: i64) -> Result<Option<Commit>, GrindError> {
        Ok(self
            .commits
            .values()
            .filter(|c| c.assignment_id == assignment_id && !c.closed)
            .max_by_key(|c| (c.updated_at, c.id))
            .cloned())
    }

    fn save_commit(&mut self, commit: &Commit) -> Result<i64, GrindError> {
        let mut row = commit.clone();
        if row.id == 0 {
            row.id = self.next_id();
        } else if !self.commits.contains_key(&row.id) {
            return Err(GrindError::Storage(format!("commit {} disappeared during update", row.id)));
        }
        let id = row.id;
        self.commits.insert(id, row);
        Ok(id)
    }
}

/// Stores kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, GrindError> {
        self.state.lock().map_err(|_| GrindError::Storage("memory store lock poisoned".into()))
    }
}

impl CommitStore for MemoryStore {
    fn in_transaction(&self, work: &mut TxWork<'_>) -> Result<(), GrindError> {
        let mut state = self.lock()?;
        let mut scratch = state.clone();
        work(&mut scratch)?;
        *state = scratch;
        Ok(())
    }

    fn create_assignment(
        &self,
        user_id: i64,
        problem_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Assignment, GrindError> {
        let mut state = self.lock()?;
        let assignment = Assignment { id: state.next_id(), user_id, problem_id, created_at: now };
        state.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    fn list_commits(&self, user_id: i64, assignment_id: i64) -> Result<Vec<Commit>, GrindError> {
        Ok(self.lock()?.owned_commits(user_id, assignment_id))
    }

    fn last_commit(
        &self,
        user_id: i64,
        assignment_id: i64,
    ) -> Result<Option<Commit>, GrindError> {
        Ok(self.lock()?.owned_commits(user_id, assignment_id).pop())
    }

    fn get_commit(
        &self,
        user_id: i64,
        assignment_id: i64,
        commit_id: i64,
    ) -> Result<Option<Commit>, GrindError> {
        Ok(self
            .lock()?
            .commits
            .get(&commit_id)
            .filter(|c| c.user_id == user_id && c.assignment_id == assignment_id)
            .cloned())
    }

    fn delete_commit(
        &self,
        user_id: i64,
        assignment_id: i64,
        commit_id: i64,
    ) -> Result<bool, GrindError> {
        let mut state = self.lock()?;
        let owned = state
            .commits
            .get(&commit_id)
            .is_some_and(|c| c.user_id == user_id && c.assignment_id == assignment_id);
        if owned {
            state.commits.remove(&commit_id);
        }
        Ok(owned)
    }

    fn delete_commits(&self, user_id: i64, assignment_id: i64) -> Result<usize, GrindError> {
        let mut state = self.lock()?;
        let before = state.commits.len();
        state.commits.retain(|_, c| !(c.user_id == user_id && c.assignment_id == assignment_id));
        Ok(before - state.commits.len())
    }
}

impl ProblemStore for MemoryStore {
    fn save_problem(
        &self,
        problem: &mut Problem,
        steps: &mut [ProblemStep],
        sign: &Signer<'_>,
    ) -> Result<String, GrindError> {
        let mut state = self.lock()?;
        let taken = state
            .problems
            .values()
            .any(|p| p.problem.unique == problem.unique && p.problem.id != problem.id);
        if taken {
            return Err(GrindError::Storage(format!(
                "problem unique key {:?} already in use",
                problem.unique
            )));
        }

        let mut scratch = state.clone();
        let mut signed_problem = problem.clone();
        let mut signed_steps = steps.to_vec();
        if signed_problem.id == 0 {
            signed_problem.id = scratch.next_id();
        }
        for step in &mut signed_steps {
            step.problem_id = signed_problem.id;
        }
        let signature = sign(&signed_problem, &signed_steps)?;
        scratch.problems.insert(
            signed_problem.id,
            SignedProblem {
                problem: signed_problem.clone(),
                steps: signed_steps.clone(),
                signature: signature.clone(),
            },
        );
        *state = scratch;
        *problem = signed_problem;
        steps.clone_from_slice(&signed_steps);
        Ok(signature)
    }

    fn load_problem(&self, problem_id: i64) -> Result<Option<SignedProblem>, GrindError> {
        Ok(self.lock()?.problems.get(&problem_id).cloned())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock stopped at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
