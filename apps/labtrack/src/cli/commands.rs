//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config::{Backend, Settings, load_catalog_file};
use labtrack_core::{
    CertificateGate, DigestCertificateRenderer, LabId, LabtrackError, ProgressRecord,
    RedbProgressStore, TransitionEvent, TransitionRequest, UserId,
};
use serde::Serialize;
use std::path::Path;

/// Print a value as pretty JSON.
fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

/// Print the fields of a record that matter to a learner.
fn print_record(record: &ProgressRecord) {
    println!("Stage:        {}", record.stage);
    println!("Passed:       {}", if record.passed { "yes" } else { "no" });
    println!("Best Score:   {}", record.best_score);
    if let Some(last) = record.last_attempt {
        println!("Last Attempt: {} ({} total)", last.score, record.attempts);
    }
    if let Some(issued_at) = record.certificate_issued_at {
        println!("Certified At: {}", issued_at.seconds());
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse a comma-separated list of choice indices, e.g. `"1,0,2"`.
pub fn parse_answers(raw: &str) -> Result<Vec<usize>, LabtrackError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|part| {
            part.trim().parse::<usize>().map_err(|_| {
                LabtrackError::MalformedSubmission(format!(
                    "'{}' is not a choice index",
                    part.trim()
                ))
            })
        })
        .collect()
}

/// Build a transition event from its name; `-` and `_` are interchangeable.
pub fn parse_event(name: &str, answers: Option<&str>) -> Result<TransitionEvent, LabtrackError> {
    match name.replace('-', "_").as_str() {
        "view_theory" => Ok(TransitionEvent::ViewTheory),
        "submit_quiz" => {
            let raw = answers.ok_or_else(|| {
                LabtrackError::MalformedSubmission("submit_quiz needs --answers".to_string())
            })?;
            Ok(TransitionEvent::SubmitQuiz {
                answers: parse_answers(raw)?,
            })
        }
        "complete_exercise" => Ok(TransitionEvent::CompleteExercise),
        "issue_certificate" => Ok(TransitionEvent::IssueCertificate),
        other => Err(LabtrackError::MalformedSubmission(format!(
            "unknown event '{}'",
            other
        ))),
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(settings: &Settings) -> Result<(), LabtrackError> {
    let engine = settings.build_engine()?;

    println!("Labtrack Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", settings.host);
    println!("  Port:     {}", settings.port);
    println!("  Backend:  {}", settings.backend);
    println!("  Database: {:?}", settings.database);
    match &settings.catalog {
        Some(path) => println!("  Catalog:  {:?}", path),
        None => println!("  Catalog:  built-in"),
    }
    println!("  Labs:     {}", engine.catalog().len());
    println!();
    println!("Endpoints:");
    println!("  GET  /health");
    println!("  GET  /labs");
    println!("  GET  /labs/{{lab_id}}");
    println!("  GET  /learners/{{user_id}}/dashboard");
    println!("  GET  /learners/{{user_id}}/labs/{{lab_id}}");
    println!("  POST /learners/{{user_id}}/labs/{{lab_id}}/transition");
    println!("  GET  /learners/{{user_id}}/labs/{{lab_id}}/certificate");
    println!("  POST /learners/{{user_id}}/labs/{{lab_id}}/certificate");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&settings.addr(), engine).await
}

// =============================================================================
// CATALOG COMMANDS
// =============================================================================

/// List the catalog, optionally one category only.
pub fn cmd_labs(
    settings: &Settings,
    json_mode: bool,
    category: Option<&str>,
) -> Result<(), LabtrackError> {
    let catalog = settings.load_catalog()?;
    let labs: Vec<_> = catalog
        .list()
        .into_iter()
        .filter(|lab| category.is_none_or(|c| lab.category == c))
        .collect();

    if json_mode {
        print_json(&labs);
        return Ok(());
    }

    println!("Labtrack Catalog");
    println!("================");
    for (name, group) in catalog.by_category() {
        let shown: Vec<_> = group
            .iter()
            .filter(|lab| labs.iter().any(|l| l.id == lab.id))
            .collect();
        if shown.is_empty() {
            continue;
        }
        println!();
        println!("{}", if name.is_empty() { "Uncategorized" } else { name.as_str() });
        for lab in shown {
            println!(
                "  {:<28} {:<40} {:?}, {} questions, pass at {}",
                lab.id, lab.title, lab.difficulty, lab.question_count, lab.threshold
            );
        }
    }

    Ok(())
}

/// Show one lab and its questions, without answers.
pub fn cmd_lab(settings: &Settings, json_mode: bool, id: &str) -> Result<(), LabtrackError> {
    let catalog = settings.load_catalog()?;
    let definition = catalog.get(&LabId::lookup(id)?)?;

    if json_mode {
        print_json(&api::LabDetailResponse::from(definition));
        return Ok(());
    }

    println!("{} ({})", definition.title, definition.id);
    println!("{}", "=".repeat(definition.title.len() + definition.id.as_str().len() + 3));
    if !definition.description.is_empty() {
        println!("{}", definition.description);
    }
    println!();
    println!("Category:   {}", definition.category);
    println!("Difficulty: {:?}", definition.difficulty);
    println!("Pass at:    {}", definition.threshold);
    println!();
    if !definition.theory.is_empty() {
        println!("{}", definition.theory);
        println!();
    }
    for (i, question) in definition.questions.iter().enumerate() {
        println!("{}. {}", i + 1, question.prompt);
        for (c, choice) in question.choices.iter().enumerate() {
            println!("   [{}] {}", c, choice);
        }
    }

    Ok(())
}

/// Validate a catalog file and summarize it.
pub fn cmd_check_catalog(file: &Path, json_mode: bool) -> Result<(), LabtrackError> {
    let catalog = load_catalog_file(file)?;
    let questions: usize = catalog.iter().map(|lab| lab.questions.len()).sum();
    let categories = catalog.by_category();

    if json_mode {
        let output = serde_json::json!({
            "file": file.to_string_lossy(),
            "valid": true,
            "labs": catalog.len(),
            "questions": questions,
            "categories": categories.keys().collect::<Vec<_>>(),
        });
        print_json(&output);
        return Ok(());
    }

    println!("Catalog OK: {:?}", file);
    println!("  Labs:       {}", catalog.len());
    println!("  Questions:  {}", questions);
    println!("  Categories: {}", categories.len());
    Ok(())
}

// =============================================================================
// PROGRESS COMMANDS
// =============================================================================

/// Show a learner's dashboard, or one lab's record.
pub fn cmd_progress(
    settings: &Settings,
    json_mode: bool,
    user: &str,
    lab: Option<&str>,
) -> Result<(), LabtrackError> {
    let engine = settings.build_engine()?;
    let user = UserId::new(user)?;

    if let Some(lab) = lab {
        let lab = LabId::lookup(lab)?;
        let record = engine.progress(&user, &lab)?;
        if json_mode {
            print_json(&record);
        } else {
            println!("Progress of {} in {}", user, lab);
            print_record(&record);
        }
        return Ok(());
    }

    let dashboard = engine.dashboard(&user)?;
    if json_mode {
        print_json(&dashboard);
        return Ok(());
    }

    println!("Dashboard for {}", user);
    println!(
        "  Completed: {}  In progress: {}  Not started: {}  (of {})",
        dashboard.completed, dashboard.in_progress, dashboard.not_started, dashboard.total
    );
    println!();
    for entry in &dashboard.labs {
        println!(
            "  {:<28} {:<20} best {}",
            entry.lab.id, entry.record.stage, entry.record.best_score
        );
    }
    Ok(())
}

/// Apply one transition.
pub fn cmd_transition(
    settings: &Settings,
    json_mode: bool,
    user: &str,
    lab: &str,
    event: &str,
    answers: Option<&str>,
) -> Result<(), LabtrackError> {
    let event = parse_event(event, answers)?;
    if event == TransitionEvent::IssueCertificate {
        // Issuing renders the certificate too
        return cmd_certificate(settings, json_mode, user, lab, false);
    }

    let engine = settings.build_engine()?;
    let request = TransitionRequest::new(UserId::new(user)?, LabId::lookup(lab)?, event);
    let outcome = engine.apply(&request)?;

    tracing::info!(
        user = %request.user,
        lab = %request.lab,
        event = request.event.name(),
        stage = %outcome.record.stage,
        changed = outcome.changed,
        "transition applied"
    );

    if json_mode {
        print_json(&outcome);
        return Ok(());
    }

    if outcome.changed {
        println!("{} -> {}", request.event.name(), outcome.record.stage);
    } else {
        println!("{}: already satisfied", request.event.name());
    }
    if let Some(quiz) = &outcome.quiz {
        println!(
            "Quiz: {}/{} correct ({}), {}",
            quiz.correct_count,
            quiz.question_count,
            quiz.score,
            if quiz.passed { "passed" } else { "not passed" }
        );
        for (i, result) in quiz.outcomes.iter().enumerate() {
            if !result.is_correct {
                println!(
                    "  {}. chose {}, correct is {}: {}",
                    i + 1,
                    result.selected,
                    result.correct_choice,
                    result.explanation
                );
            }
        }
    }
    print_record(&outcome.record);
    Ok(())
}

/// Check eligibility or issue the certificate.
pub fn cmd_certificate(
    settings: &Settings,
    json_mode: bool,
    user: &str,
    lab: &str,
    check_only: bool,
) -> Result<(), LabtrackError> {
    let engine = settings.build_engine()?;
    let gate = CertificateGate::new(&engine);
    let user = UserId::new(user)?;
    let lab = LabId::lookup(lab)?;

    if check_only {
        let eligible = gate.is_eligible(&user, &lab)?;
        if json_mode {
            print_json(&serde_json::json!({
                "user": user.as_str(),
                "lab": lab.as_str(),
                "eligible": eligible,
            }));
        } else {
            println!(
                "{} {} eligible for the {} certificate",
                user,
                if eligible { "is" } else { "is not" },
                lab
            );
        }
        return Ok(());
    }

    let issued = gate.issue(&user, &lab, &DigestCertificateRenderer)?;
    if json_mode {
        print_json(&issued);
        return Ok(());
    }

    println!("Certificate issued");
    println!("  Reference: {}", issued.artifact.reference);
    print_record(&issued.record);
    Ok(())
}

// =============================================================================
// MAINTENANCE COMMANDS
// =============================================================================

/// Compact the redb progress database.
pub fn cmd_compact(settings: &Settings, json_mode: bool) -> Result<(), LabtrackError> {
    if settings.backend != Backend::Redb {
        return Err(LabtrackError::InvalidConfig(format!(
            "compact needs the redb backend, not {}",
            settings.backend
        )));
    }

    let size_of = |path: &Path| std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let before = size_of(&settings.database);
    let mut store = RedbProgressStore::open(&settings.database)?;
    let records = store.record_count()?;
    store.compact()?;
    drop(store);
    let after = size_of(&settings.database);

    if json_mode {
        print_json(&serde_json::json!({
            "database": settings.database.to_string_lossy(),
            "records": records,
            "bytes_before": before,
            "bytes_after": after,
        }));
        return Ok(());
    }

    println!("Compacted {:?}", settings.database);
    println!("  Records: {}", records);
    println!("  Size:    {} -> {} bytes", before, after);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
