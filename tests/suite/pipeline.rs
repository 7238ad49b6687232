//! End-to-end runs of the batch pipeline against a stub generation service.
//!
//! Each test drives `BatchRunner::run` from an input CSV on disk to the
//! checkpoint CSV on disk, then inspects what was persisted.

use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use lookalike_engine::{CancelFlag, CheckpointStore, GenerationError, PairKey};
use lookalike_types::{CONFUSABLE_THRESHOLD, ConfusionCategory};
use tempfile::tempdir;

use crate::common::{
    StubGenerator, build_runner, dummy_in, fast_options, fast_policy, judgment_json, write_input,
    write_numbered_input,
};

fn persisted_keys(store: &CheckpointStore) -> BTreeSet<PairKey> {
    store
        .load_processed_keys()
        .expect("load keys")
        .into_iter()
        .collect()
}

/// A second run over unchanged input makes no calls and leaves the output as it was.
#[tokio::test]
async fn second_run_is_a_no_op() {
    let dir = tempdir().unwrap();
    let input = write_numbered_input(dir.path(), 7);
    let output = dir.path().join("out.csv");

    let first = StubGenerator::new(|_: &str| Ok(judgment_json(0.2)));
    let summary = build_runner(
        &first,
        &output,
        fast_options(3),
        fast_policy(3),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();
    assert_eq!(summary.judged, 7);
    assert_eq!(first.calls(), 7);
    let after_first = fs::read_to_string(&output).unwrap();
    let keys_first = persisted_keys(&CheckpointStore::new(&output));

    let second = StubGenerator::new(|_: &str| Ok(judgment_json(0.9)));
    let summary = build_runner(
        &second,
        &output,
        fast_options(3),
        fast_policy(3),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(second.calls(), 0);
    assert_eq!(summary.already_processed, 7);
    assert_eq!(summary.attempted, 0);
    assert_eq!(summary.persisted_total, 7);
    assert_eq!(fs::read_to_string(&output).unwrap(), after_first);
    assert_eq!(persisted_keys(&CheckpointStore::new(&output)), keys_first);
}

/// Identical names are settled locally with the maximal verdict.
#[tokio::test]
async fn identical_names_never_reach_the_service() {
    let dir = tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[
            ("RAJESH KUMAR", "RAJESH KUMAR", "Maharashtra"),
            ("SUNITA DEVI", "SUNITA DEVI", "Uttar_Pradesh"),
        ],
    );
    let output = dir.path().join("out.csv");

    let stub = StubGenerator::new(|_: &str| Err(GenerationError::EmptyResponse));
    let summary = build_runner(
        &stub,
        &output,
        fast_options(10),
        fast_policy(3),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(stub.calls(), 0);
    assert_eq!(summary.judged, 2);

    let records = CheckpointStore::new(&output).load_records().unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        let judgment = record.judgment();
        assert!(judgment.is_confusable());
        assert!((judgment.confusion_score().value() - 1.0).abs() < f64::EPSILON);
        assert_eq!(
            judgment.confusion_categories(),
            &BTreeSet::from([
                ConfusionCategory::Visual,
                ConfusionCategory::Sound,
                ConfusionCategory::Perception,
            ])
        );
        assert!(judgment.reference_transliteration().primary_script_form.is_none());
        assert!(judgment.dummy_transliteration().regional_script_form.is_none());
    }
    assert_eq!(records[1].pair().jurisdiction(), "Uttar Pradesh");
}

/// A verdict that flags a low score is treated as a failed answer and never persisted.
#[tokio::test]
async fn persisted_flags_agree_with_scores() {
    let dir = tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[
            ("MOHAN LAL", "MOHAN LALL", "Rajasthan"),
            ("ANIL SHARMA", "SUNIL SHARMA", "Haryana"),
            ("GITA RANI", "SITA RANI", "Punjab"),
        ],
    );
    let output = dir.path().join("out.csv");

    let stub = StubGenerator::new(|prompt: &str| match dummy_in(prompt) {
        "MOHAN LALL" => Ok(judgment_json(0.85)),
        "SUNIL SHARMA" => Ok(judgment_json(0.4)),
        _ => Ok(r#"{"reference": {"hindi": "गीता", "regional": "ਗੀਤਾ"},
"dummy": {"hindi": "सीता", "regional": "ਸੀਤਾ"},
"potentially_confusing": true,
"confusion_type": ["VISUAL"],
"confusion_score": 0.3}"#
            .to_string()),
    });
    let summary = build_runner(
        &stub,
        &output,
        fast_options(10),
        fast_policy(2),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(summary.judged, 2);
    assert_eq!(summary.unresolved, 1);
    // Two attempts for the inconsistent answer, one each for the others.
    assert_eq!(stub.calls(), 4);

    let records = CheckpointStore::new(&output).load_records().unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        let judgment = record.judgment();
        assert_eq!(
            judgment.is_confusable(),
            judgment.confusion_score().value() >= CONFUSABLE_THRESHOLD,
            "{:?}",
            record.pair()
        );
    }
    assert!(records.iter().all(|r| r.pair().dummy_name() != "SITA RANI"));
}

/// A pair that fails every attempt is left out and picked up by the next run.
#[tokio::test]
async fn exhausted_pair_is_retried_next_run() {
    let dir = tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[
            ("RAVI VERMA", "RAVI VARMA", "Bihar"),
            ("ASHOK YADAV", "ASHOK JADAV", "Bihar"),
            ("PREM SINGH", "PREM SING", "Bihar"),
        ],
    );
    let output = dir.path().join("out.csv");
    let stuck = PairKey::new("ASHOK YADAV", "ASHOK JADAV", "Bihar");

    let flaky = StubGenerator::new(|prompt: &str| {
        if dummy_in(prompt) == "ASHOK JADAV" {
            Err(GenerationError::Status {
                status: 503,
                body: "overloaded".to_string(),
                retry_after: None,
            })
        } else {
            Ok(judgment_json(0.8))
        }
    });
    let summary = build_runner(
        &flaky,
        &output,
        fast_options(2),
        fast_policy(3),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(flaky.calls(), 2 + 3);
    assert_eq!(summary.judged, 2);
    assert_eq!(summary.unresolved, 1);
    assert_eq!(summary.persisted_total, 2);
    assert!(!persisted_keys(&CheckpointStore::new(&output)).contains(&stuck));

    let healthy = StubGenerator::new(|_: &str| Ok(judgment_json(0.75)));
    let summary = build_runner(
        &healthy,
        &output,
        fast_options(2),
        fast_policy(3),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(healthy.calls(), 1);
    assert_eq!(summary.already_processed, 2);
    assert_eq!(summary.persisted_total, 3);
    assert!(persisted_keys(&CheckpointStore::new(&output)).contains(&stuck));
}

/// Interrupting mid-batch keeps the flushed batches plus the in-flight successes.
#[tokio::test]
async fn interrupt_flushes_partial_batch() {
    let dir = tempdir().unwrap();
    let input = write_numbered_input(dir.path(), 10);
    let output = dir.path().join("out.csv");

    let cancel = CancelFlag::new();
    let seen = AtomicUsize::new(0);
    let trigger = cancel.clone();
    let stub = StubGenerator::new(|_: &str| {
        // Two full batches of three, then one more success in the third batch.
        if seen.fetch_add(1, Ordering::SeqCst) + 1 == 7 {
            trigger.cancel();
        }
        Ok(judgment_json(0.1))
    });

    let summary = build_runner(&stub, &output, fast_options(3), fast_policy(3), cancel)
        .run(&input)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.attempted, 7);
    assert_eq!(summary.persisted_total, 7);

    let expected: BTreeSet<PairKey> = (0..7)
        .map(|i| PairKey::new(format!("REF {i}"), format!("DUMMY {i}"), "Bihar"))
        .collect();
    assert_eq!(persisted_keys(&CheckpointStore::new(&output)), expected);

    let resume = StubGenerator::new(|_: &str| Ok(judgment_json(0.1)));
    let summary = build_runner(
        &resume,
        &output,
        fast_options(3),
        fast_policy(3),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();
    assert!(!summary.interrupted);
    assert_eq!(resume.calls(), 3);
    assert_eq!(summary.persisted_total, 10);
}

/// The service's verdict is stored as given.
#[tokio::test]
async fn shared_surname_verdict_passes_through() {
    let dir = tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[
            ("RAJESH KUMAR", "RAJESH KUMAR", "Maharashtra"),
            ("A B SINGH", "C D SINGH", "Punjab"),
        ],
    );
    let output = dir.path().join("out.csv");

    let stub = StubGenerator::new(|prompt: &str| {
        assert!(prompt.contains("from Punjab state"));
        Ok(judgment_json(0.2))
    });
    build_runner(
        &stub,
        &output,
        fast_options(10),
        fast_policy(1),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();
    assert_eq!(stub.calls(), 1);

    let records = CheckpointStore::new(&output).load_records().unwrap();
    let identical = records
        .iter()
        .find(|r| r.pair().dummy_name() == "RAJESH KUMAR")
        .unwrap();
    assert!(identical.judgment().is_confusable());
    assert!((identical.judgment().confusion_score().value() - 1.0).abs() < f64::EPSILON);

    let singh = records
        .iter()
        .find(|r| r.pair().dummy_name() == "C D SINGH")
        .unwrap();
    assert!(!singh.judgment().is_confusable());
    assert!((singh.judgment().confusion_score().value() - 0.2).abs() < f64::EPSILON);
    assert_eq!(
        singh.judgment().confusion_categories(),
        &BTreeSet::from([ConfusionCategory::NotConfusing])
    );
    assert_eq!(
        singh
            .judgment()
            .dummy_transliteration()
            .primary_script_form
            .as_deref(),
        Some("रमेश")
    );
}

/// A checkpoint written by an earlier tool, columns reordered and flags lower-case, still resumes.
#[tokio::test]
async fn resumes_from_foreign_checkpoint() {
    let dir = tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[
            ("RAVI VERMA", "RAVI VARMA", "Tamil_Nadu"),
            ("ASHOK YADAV", "ASHOK JADAV", "Tamil_Nadu"),
        ],
    );
    let output = dir.path().join("out.csv");
    fs::write(
        &output,
        "state,dummy_name,ref_name,ref_hindi,ref_regional,\
dummy_hindi,dummy_regional,potentially_confusing,confusion_type,confusion_score,notes\n\
Tamil Nadu,RAVI VARMA,RAVI VERMA,रवि,ரவி,रवि,ரவி,true,\"[\"\"SOUND\"\"]\",0.9,checked\n",
    )
    .unwrap();

    let stub = StubGenerator::new(|prompt: &str| {
        assert_eq!(dummy_in(prompt), "ASHOK JADAV");
        Ok(judgment_json(0.3))
    });
    let summary = build_runner(
        &stub,
        &output,
        fast_options(5),
        fast_policy(1),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(stub.calls(), 1);
    assert_eq!(summary.already_processed, 1);
    assert_eq!(summary.persisted_total, 2);
}
