//! Publishing signed problems and loading them back with verification.

use crate::error::GrindError;
use crate::instructions::DocRenderer;
use crate::model::{Problem, ProblemInfo, ProblemStep};
use crate::ports::{Clock, ProblemStore, SignedProblem};
use crate::signature::{compute_signature, verify_signature};
use crate::whitelist::{step_whitelists, to_dotfile_whitelist};

/// Normalizes, stamps, signs, and stores a problem with its steps.
///
/// A new problem (id 0) gets `created_at` set to now; `updated_at` is
/// always set to now. The signature covers the final stored ids.
///
/// # Errors
///
/// Returns a validation error if normalization fails and a storage error
/// if the problem cannot be saved.
pub fn publish_problem(
    store: &dyn ProblemStore,
    clock: &dyn Clock,
    secret: &str,
    docs: &dyn DocRenderer,
    mut problem: Problem,
    mut steps: Vec<ProblemStep>,
) -> Result<SignedProblem, GrindError> {
    let now = clock.now();
    if problem.id == 0 {
        problem.created_at = now;
    }
    problem.updated_at = now;
    problem.normalize(now, &mut steps, docs)?;

    let signature =
        store.save_problem(&mut problem, &mut steps, &|p, s| compute_signature(secret, p, s))?;
    tracing::info!(problem = problem.id, unique = %problem.unique, steps = steps.len(), "published problem");
    Ok(SignedProblem { problem, steps, signature })
}

/// Loads a problem and checks its stored signature.
///
/// # Errors
///
/// Returns [`GrindError::NotFound`] if there is no such problem and
/// [`GrindError::Integrity`] if the content no longer matches its signature.
pub fn load_verified_problem(
    store: &dyn ProblemStore,
    secret: &str,
    problem_id: i64,
) -> Result<SignedProblem, GrindError> {
    let signed = store
        .load_problem(problem_id)?
        .ok_or_else(|| GrindError::NotFound(format!("problem {problem_id}")))?;
    verify_signature(secret, &signed.problem, &signed.steps, &signed.signature)?;
    Ok(signed)
}

/// Returns the problem step a commit names.
///
/// # Errors
///
/// Returns a validation error if the problem has no such step.
pub fn verify_commit_step(problem: &SignedProblem, step: i64) -> Result<&ProblemStep, GrindError> {
    problem.steps.iter().find(|s| s.step == step).ok_or_else(|| {
        GrindError::Validation(format!(
            "problem {} has no step {step} (it has {})",
            problem.problem.unique,
            problem.steps.len()
        ))
    })
}

/// Builds the metadata-file entry for a student at `step`.
///
/// # Errors
///
/// Returns a validation error if the problem has no such step.
pub fn dotfile_entry(problem: &SignedProblem, step: i64) -> Result<ProblemInfo, GrindError> {
    verify_commit_step(problem, step)?;
    let whitelists = step_whitelists(&problem.steps);
    let index = usize::try_from(step - 1)
        .map_err(|_| GrindError::Validation(format!("invalid step {step}")))?;
    let whitelist = whitelists
        .get(index)
        .map(to_dotfile_whitelist)
        .ok_or_else(|| GrindError::Validation(format!("invalid step {step}")))?;
    Ok(ProblemInfo { id: problem.problem.id, step, whitelist })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::adapters::memory::{ManualClock, MemoryStore};
    use crate::error::ErrorKind;
    use crate::instructions::PreformattedRenderer;

    const SECRET: &str = "publish-secret";

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn step(note: &str, files: &[(&str, &str)]) -> ProblemStep {
        let mut all: BTreeMap<String, String> =
            files.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        all.insert("_doc/index.md".into(), format!("# {note}\n"));
        ProblemStep {
            problem_id: 0,
            step: 0,
            note: note.into(),
            instructions: String::new(),
            weight: 0.0,
            files: all,
        }
    }

    fn draft() -> (Problem, Vec<ProblemStep>) {
        let problem = Problem {
            id: 0,
            unique: " hello-world ".into(),
            note: "Hello, world".into(),
            problem_type: "python3unittest".into(),
            tags: vec!["b".into(), " a".into()],
            options: Vec::new(),
            created_at: at("2020-01-01T00:00:00Z"),
            updated_at: at("2020-01-01T00:00:00Z"),
        };
        let steps = vec![
            step("write it", &[("main.py", "pass\n")]),
            step("test it", &[("tests/test_main.py", "import main\n"), ("util.py", "")]),
        ];
        (problem, steps)
    }

    fn publish(store: &MemoryStore, clock: &ManualClock) -> SignedProblem {
        let (problem, steps) = draft();
        publish_problem(store, clock, SECRET, &PreformattedRenderer, problem, steps).unwrap()
    }

    #[test]
    fn publishing_normalizes_stamps_and_signs() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(at("2024-05-01T12:00:00Z"));
        let signed = publish(&store, &clock);

        assert!(signed.problem.id > 0);
        assert_eq!(signed.problem.unique, "hello-world");
        assert_eq!(signed.problem.tags, vec!["a", "b"]);
        assert_eq!(signed.problem.created_at, at("2024-05-01T12:00:00Z"));
        assert_eq!(signed.steps[1].step, 2);
        assert!(signed.steps.iter().all(|s| s.problem_id == signed.problem.id));
        assert!(signed.steps[0].instructions.contains("write it"));

        let loaded = load_verified_problem(&store, SECRET, signed.problem.id).unwrap();
        assert_eq!(loaded, signed);
    }

    #[test]
    fn republishing_keeps_creation_time() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(at("2024-05-01T12:00:00Z"));
        let first = publish(&store, &clock);
        clock.advance(TimeDelta::hours(1));

        let mut problem = first.problem.clone();
        problem.note = "Hello again".into();
        let second =
            publish_problem(&store, &clock, SECRET, &PreformattedRenderer, problem, first.steps.clone())
                .unwrap();
        assert_eq!(second.problem.id, first.problem.id);
        assert_eq!(second.problem.created_at, first.problem.created_at);
        assert_eq!(second.problem.updated_at, at("2024-05-01T13:00:00Z"));
        assert_ne!(second.signature, first.signature);
    }

    #[test]
    fn invalid_problem_is_not_stored() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(at("2024-05-01T12:00:00Z"));
        let (problem, _) = draft();
        let err = publish_problem(&store, &clock, SECRET, &PreformattedRenderer, problem, Vec::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.load_problem(1).unwrap().is_none());
    }

    #[test]
    fn loading_rejects_wrong_secret_and_missing_problem() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(at("2024-05-01T12:00:00Z"));
        let signed = publish(&store, &clock);

        let err = load_verified_problem(&store, "other", signed.problem.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        let err = load_verified_problem(&store, SECRET, 999).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn commit_steps_must_exist() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(at("2024-05-01T12:00:00Z"));
        let signed = publish(&store, &clock);
        assert_eq!(verify_commit_step(&signed, 2).unwrap().note, "test it");
        assert!(verify_commit_step(&signed, 0).is_err());
        assert!(verify_commit_step(&signed, 3).is_err());
    }

    #[test]
    fn dotfile_entry_accumulates_root_files() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(at("2024-05-01T12:00:00Z"));
        let signed = publish(&store, &clock);

        let first = dotfile_entry(&signed, 1).unwrap();
        assert_eq!(first.allowed().into_iter().collect::<Vec<_>>(), vec!["main.py"]);
        let second = dotfile_entry(&signed, 2).unwrap();
        assert_eq!(second.id, signed.problem.id);
        assert_eq!(second.allowed().into_iter().collect::<Vec<_>>(), vec!["main.py", "util.py"]);
        assert!(dotfile_entry(&signed, 3).is_err());
    }
}
