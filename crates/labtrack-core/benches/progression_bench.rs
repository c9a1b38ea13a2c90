//! # Progression Benchmarks
//!
//! Performance benchmarks for quiz scoring and stage transitions.
//!
//! Run with: `cargo bench -p labtrack-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use labtrack_core::{
    LabCatalog, LabId, MemoryProgressStore, ProgressRecord, ProgressionEngine, QuizEngine,
    QuizSubmission, UserId, record_from_bytes, record_to_bytes,
};
use std::hint::black_box;
use std::sync::Arc;

fn catalog_with_questions(questions: usize) -> LabCatalog {
    let mut source = String::from("[[lab]]\nid = \"bench\"\ntitle = \"Bench\"\n");
    for i in 0..questions {
        source.push_str(&format!(
            "\n[[lab.question]]\nprompt = \"Q{i}\"\nchoices = [\"a\", \"b\", \"c\", \"d\"]\ncorrect = {}\nexplanation = \"\"\n",
            i % 4
        ));
    }
    LabCatalog::from_toml_str(&source).expect("catalog")
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_quiz_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("quiz_scoring");

    for size in [10, 50, 200].iter() {
        let catalog = catalog_with_questions(*size);
        let lab = catalog.get(&LabId::new("bench").expect("id")).expect("lab");
        let answers: Vec<usize> = (0..*size).map(|i| (i * 7) % 4).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(QuizEngine::score_answers(lab, &answers)))
        });
    }

    group.finish();
}

fn bench_submit_quiz(c: &mut Criterion) {
    let catalog = Arc::new(catalog_with_questions(10));
    let engine = ProgressionEngine::new(catalog, Arc::new(MemoryProgressStore::new()));
    let user = UserId::new("bench-user").expect("user");
    let lab = LabId::new("bench").expect("lab");
    engine.view_theory(&user, &lab).expect("view");
    let submission = QuizSubmission::new(user, lab, (0..10).map(|i| i % 4).collect());

    c.bench_function("submit_quiz_memory", |b| {
        b.iter(|| black_box(engine.submit_quiz(&submission)))
    });
}

fn bench_dashboard(c: &mut Criterion) {
    let catalog = Arc::new(LabCatalog::builtin().expect("catalog"));
    let engine = ProgressionEngine::new(catalog, Arc::new(MemoryProgressStore::new()));
    let user = UserId::new("bench-user").expect("user");
    let ids: Vec<LabId> = engine.catalog().iter().map(|lab| lab.id.clone()).collect();
    for lab in &ids {
        engine.view_theory(&user, lab).expect("view");
    }

    c.bench_function("dashboard_builtin", |b| {
        b.iter(|| black_box(engine.dashboard(&user)))
    });
}

fn bench_record_codec(c: &mut Criterion) {
    let record = ProgressRecord::default();
    let bytes = record_to_bytes(&record).expect("encode");

    c.bench_function("record_to_bytes", |b| {
        b.iter(|| black_box(record_to_bytes(&record)))
    });
    c.bench_function("record_from_bytes", |b| {
        b.iter(|| black_box(record_from_bytes(&bytes)))
    });
}

criterion_group!(
    benches,
    bench_quiz_scoring,
    bench_submit_quiz,
    bench_dashboard,
    bench_record_codec
);
criterion_main!(benches);
