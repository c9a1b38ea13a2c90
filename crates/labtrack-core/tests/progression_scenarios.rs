//! # Progression Scenarios
//!
//! End-to-end flows through the engine, against both store backends.

use labtrack_core::{
    FixedClock, LabCatalog, LabId, LabtrackError, MemoryProgressStore, ProgressStore,
    ProgressionEngine, QuizSubmission, RedbProgressStore, Score, Stage, Timestamp, UserId,
};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

/// A catalog with one lab of `questions` questions; choice 1 is always correct.
fn single_lab_catalog(id: &str, questions: usize, threshold: &str) -> LabCatalog {
    let mut source = format!(
        "[[lab]]\nid = \"{id}\"\ntitle = \"{id}\"\ncategory = \"Scenarios\"\npassing_threshold = \"{threshold}\"\n"
    );
    for i in 0..questions {
        source.push_str(&format!(
            "\n[[lab.question]]\nprompt = \"Question {i}\"\nchoices = [\"wrong\", \"right\", \"also wrong\"]\ncorrect = 1\nexplanation = \"Choice 1 is right.\"\n"
        ));
    }
    LabCatalog::from_toml_str(&source).expect("catalog")
}

/// `correct` right answers followed by wrong ones.
fn answers(questions: usize, correct: usize) -> Vec<usize> {
    (0..questions).map(|i| if i < correct { 1 } else { 0 }).collect()
}

fn engine(catalog: LabCatalog, store: Arc<dyn ProgressStore>) -> ProgressionEngine {
    ProgressionEngine::new(Arc::new(catalog), store)
        .with_clock(Arc::new(FixedClock(Timestamp(1_700_000_000))))
}

fn user(name: &str) -> UserId {
    UserId::new(name).expect("user")
}

fn lab(id: &str) -> LabId {
    LabId::new(id).expect("lab")
}

// =============================================================================
// END-TO-END
// =============================================================================

#[test]
fn bb84_full_progression() {
    let engine = engine(
        single_lab_catalog("bb84", 10, "0.70"),
        Arc::new(MemoryProgressStore::new()),
    );
    let learner = user("new-learner");
    let bb84 = lab("bb84");

    let viewed = engine.view_theory(&learner, &bb84).expect("view");
    assert_eq!(viewed.record.stage, Stage::TheoryViewed);

    let failed = engine
        .submit_quiz(&QuizSubmission::new(learner.clone(), bb84.clone(), answers(10, 5)))
        .expect("first attempt");
    assert_eq!(failed.record.stage, Stage::TheoryViewed);
    assert!(!failed.record.passed);
    assert_eq!(failed.record.best_score, Score::from_bps(5_000).expect("score"));
    assert!(failed.quiz.is_some_and(|q| !q.passed && q.correct_count == 5));

    let passed = engine
        .submit_quiz(&QuizSubmission::new(learner.clone(), bb84.clone(), answers(10, 8)))
        .expect("second attempt");
    assert_eq!(passed.record.stage, Stage::QuizPassed);
    assert!(passed.record.passed);
    assert_eq!(passed.record.best_score, Score::from_bps(8_000).expect("score"));

    let exercised = engine.complete_exercise(&learner, &bb84).expect("exercise");
    assert_eq!(exercised.record.stage, Stage::ExerciseCompleted);

    let certified = engine.issue_certificate(&learner, &bb84).expect("certificate");
    assert_eq!(certified.record.stage, Stage::CertificateIssued);
    assert!(certified.record.certificate_issued);
    assert_eq!(
        certified.record.certificate_issued_at,
        Some(Timestamp(1_700_000_000))
    );
    assert_eq!(certified.record.attempts, 2);
}

#[test]
fn exactly_seventy_percent_passes() {
    let engine = engine(
        single_lab_catalog("bb84", 10, "0.70"),
        Arc::new(MemoryProgressStore::new()),
    );
    let learner = user("edge");
    let bb84 = lab("bb84");
    engine.view_theory(&learner, &bb84).expect("view");

    let at = engine
        .submit_quiz(&QuizSubmission::new(learner.clone(), bb84.clone(), answers(10, 7)))
        .expect("submit");
    assert!(at.record.passed);

    let other = user("edge-2");
    engine.view_theory(&other, &bb84).expect("view");
    let below = engine
        .submit_quiz(&QuizSubmission::new(other, bb84, answers(10, 6)))
        .expect("submit");
    assert!(!below.record.passed);
}

#[test]
fn complete_exercise_twice_is_idempotent() {
    let engine = engine(
        single_lab_catalog("tele", 4, "0.70"),
        Arc::new(MemoryProgressStore::new()),
    );
    let learner = user("repeat");
    let tele = lab("tele");
    engine.view_theory(&learner, &tele).expect("view");
    engine
        .submit_quiz(&QuizSubmission::new(learner.clone(), tele.clone(), answers(4, 4)))
        .expect("submit");

    let first = engine.complete_exercise(&learner, &tele).expect("first");
    let second = engine.complete_exercise(&learner, &tele).expect("second");
    assert_eq!(first.record.stage, Stage::ExerciseCompleted);
    assert_eq!(second.record, first.record);
    assert!(!second.changed);

    engine.issue_certificate(&learner, &tele).expect("certificate");
    let after = engine.complete_exercise(&learner, &tele).expect("after certificate");
    assert_eq!(after.record.stage, Stage::CertificateIssued);
}

#[test]
fn certificate_before_pass_is_rejected_and_writes_nothing() {
    let engine = engine(
        single_lab_catalog("bb84", 10, "0.70"),
        Arc::new(MemoryProgressStore::new()),
    );
    let learner = user("eager");
    let bb84 = lab("bb84");
    engine.view_theory(&learner, &bb84).expect("view");
    let before = engine.progress(&learner, &bb84).expect("progress");

    let err = engine.issue_certificate(&learner, &bb84).expect_err("guard");
    assert_eq!(
        err,
        LabtrackError::StageGuardViolation {
            required: Stage::ExerciseCompleted,
            current: Stage::TheoryViewed,
        }
    );
    assert_eq!(engine.progress(&learner, &bb84).expect("progress"), before);
}

#[test]
fn failed_retake_after_certificate_keeps_everything() {
    let engine = engine(
        single_lab_catalog("bb84", 10, "0.70"),
        Arc::new(MemoryProgressStore::new()),
    );
    let learner = user("veteran");
    let bb84 = lab("bb84");
    engine.view_theory(&learner, &bb84).expect("view");
    engine
        .submit_quiz(&QuizSubmission::new(learner.clone(), bb84.clone(), answers(10, 9)))
        .expect("submit");
    engine.complete_exercise(&learner, &bb84).expect("exercise");
    engine.issue_certificate(&learner, &bb84).expect("certificate");

    let retake = engine
        .submit_quiz(&QuizSubmission::new(learner.clone(), bb84.clone(), answers(10, 2)))
        .expect("retake");
    assert_eq!(retake.record.stage, Stage::CertificateIssued);
    assert!(retake.record.passed);
    assert_eq!(retake.record.best_score, Score::from_bps(9_000).expect("score"));
    assert_eq!(
        retake.record.last_attempt.map(|a| a.score),
        Score::from_bps(2_000)
    );
}

#[test]
fn progress_survives_engine_restart() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("restart.db");
    let learner = user("persistent");
    let bb84 = lab("bb84");

    {
        let store = Arc::new(RedbProgressStore::open(&path).expect("open"));
        let engine = engine(single_lab_catalog("bb84", 10, "0.70"), store);
        engine.view_theory(&learner, &bb84).expect("view");
        engine
            .submit_quiz(&QuizSubmission::new(learner.clone(), bb84.clone(), answers(10, 8)))
            .expect("submit");
    }

    let store = Arc::new(RedbProgressStore::open(&path).expect("reopen"));
    let engine = engine(single_lab_catalog("bb84", 10, "0.70"), store);
    let record = engine.progress(&learner, &bb84).expect("progress");
    assert_eq!(record.stage, Stage::QuizPassed);
    assert!(record.passed);
    engine.complete_exercise(&learner, &bb84).expect("resume");
}

// =============================================================================
// CONCURRENCY
// =============================================================================

/// Race a 65% and an 85% submission for the same key, many times.
fn race_submissions(store: Arc<dyn ProgressStore>) {
    const QUESTIONS: usize = 20;
    let engine = Arc::new(engine(single_lab_catalog("bb84", QUESTIONS, "0.70"), store));
    let bb84 = lab("bb84");

    for round in 0..25 {
        let learner = user(&format!("racer-{}", round));
        engine.view_theory(&learner, &bb84).expect("view");

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [13, 17]
            .into_iter()
            .map(|correct| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                let submission =
                    QuizSubmission::new(learner.clone(), bb84.clone(), answers(QUESTIONS, correct));
                thread::spawn(move || {
                    barrier.wait();
                    engine.submit_quiz(&submission)
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread").expect("submit");
        }

        let record = engine.progress(&learner, &bb84).expect("progress");
        assert!(record.passed, "round {}", round);
        assert_eq!(record.best_score, Score::from_bps(8_500).expect("score"));
        assert_eq!(record.stage, Stage::QuizPassed);
        assert_eq!(record.attempts, 2);
    }
}

#[test]
fn concurrent_submissions_memory_store() {
    race_submissions(Arc::new(MemoryProgressStore::new()));
}

#[test]
fn concurrent_submissions_redb_store() {
    let dir = tempdir().expect("tempdir");
    let store = RedbProgressStore::open(dir.path().join("race.db")).expect("open");
    race_submissions(Arc::new(store));
}

#[test]
fn different_keys_do_not_interfere() {
    let engine = Arc::new(engine(
        single_lab_catalog("bb84", 10, "0.70"),
        Arc::new(MemoryProgressStore::new()),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let learner = user(&format!("parallel-{}", i));
                let bb84 = lab("bb84");
                engine.view_theory(&learner, &bb84)?;
                engine.submit_quiz(&QuizSubmission::new(learner, bb84, answers(10, i + 2)))
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.join().expect("thread").expect("transition");
        assert_eq!(outcome.record.passed, i + 2 >= 7);
    }
}
