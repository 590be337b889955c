use anyhow::Result;
use scan_intake::app::{RegistrationOutcome, RegistrationUseCase, Rejection};
use scan_intake::storage::{RegistryStore, SqliteStore};
use scan_intake::types::CategoryReference;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn seeded_store(dir: &TempDir) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(dir.path().join("intake.db"), Duration::from_secs(10))?;
    for (code, variety) in [("A1", "Freedom"), ("60", "Explorer")] {
        store.upsert_category(&CategoryReference {
            category_code: code.to_string(),
            variety: variety.to_string(),
            block: "12".to_string(),
            size: Some("NA".to_string()),
            stem_count: 25,
        })?;
    }
    Ok(Arc::new(store))
}

#[tokio::test]
async fn test_letter_prefixed_scan_is_created_with_default_stage() -> Result<()> {
    let dir = tempdir()?;
    let store = seeded_store(&dir)?;
    let use_case = RegistrationUseCase::with_default_stage(store.clone());

    let outcome = use_case.register("A1123456", None).await;

    assert_eq!(
        outcome,
        RegistrationOutcome::Created {
            barcode: "A1123456".to_string(),
            stage: "Ingreso".to_string(),
        }
    );
    let row = store.find_registration("A1123456")?.expect("row stored");
    assert_eq!(row.category_code, "A1");
    assert_eq!(row.serial, "123456");
    assert_eq!(row.variety, "Freedom");
    assert_eq!(row.size.as_deref(), Some("NA"));
    assert_eq!(row.stage, "Ingreso");
    Ok(())
}

#[tokio::test]
async fn test_repeat_scan_is_already_registered_and_keeps_first_stage() -> Result<()> {
    let dir = tempdir()?;
    let store = seeded_store(&dir)?;
    let use_case = RegistrationUseCase::with_default_stage(store.clone());

    let first = use_case.register("60123456", Some("Cuarto Frio")).await;
    let second = use_case.register("60123456", Some("Cuarto Frio")).await;
    let third = use_case.register(" 60123456 ", None).await;

    assert_eq!(
        first,
        RegistrationOutcome::Created {
            barcode: "60123456".to_string(),
            stage: "Cuarto Frio".to_string(),
        }
    );
    assert_eq!(
        second,
        RegistrationOutcome::AlreadyRegistered {
            barcode: "60123456".to_string(),
            stage: "Cuarto Frio".to_string(),
        }
    );
    assert_eq!(third.label(), "already_registered");
    assert_eq!(store.find_registration("60123456")?.unwrap().stage, "Cuarto Frio");
    Ok(())
}

#[tokio::test]
async fn test_lowercase_repeat_hits_same_barcode() -> Result<()> {
    let dir = tempdir()?;
    let store = seeded_store(&dir)?;
    let use_case = RegistrationUseCase::with_default_stage(store);

    assert_eq!(use_case.register("a1777", None).await.label(), "created");
    assert_eq!(use_case.register("A1777", None).await.label(), "already_registered");
    Ok(())
}

#[tokio::test]
async fn test_unknown_category_is_rejected_without_writing() -> Result<()> {
    let dir = tempdir()?;
    let store = seeded_store(&dir)?;
    let use_case = RegistrationUseCase::with_default_stage(store.clone());

    let outcome = use_case.register("991234", Some("Ingreso")).await;

    assert_eq!(
        outcome,
        RegistrationOutcome::Rejected(Rejection::UnknownCategory("99".to_string()))
    );
    assert!(store.find_registration("991234")?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_reference_changes_are_seen_without_restart() -> Result<()> {
    let dir = tempdir()?;
    let store = seeded_store(&dir)?;
    let use_case = RegistrationUseCase::with_default_stage(store.clone());

    assert_eq!(use_case.register("B2100", None).await.label(), "unknown_category");

    store.upsert_category(&CategoryReference {
        category_code: "B2".to_string(),
        variety: "Vendela".to_string(),
        block: "4".to_string(),
        size: None,
        stem_count: 20,
    })?;

    assert_eq!(use_case.register("B2100", None).await.label(), "created");
    Ok(())
}

#[tokio::test]
async fn test_malformed_codes_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let use_case = RegistrationUseCase::with_default_stage(seeded_store(&dir)?);

    for raw in ["", "abc", "A", "A1", "60", "A1-123", "60 12"] {
        match use_case.register(raw, None).await {
            RegistrationOutcome::Rejected(Rejection::InvalidCode(_)) => {}
            other => panic!("{:?} produced {:?}", raw, other),
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_unreachable_store_reports_storage_error() -> Result<()> {
    let dir = tempdir()?;
    let store = seeded_store(&dir)?;
    let use_case = RegistrationUseCase::with_default_stage(store.clone());

    // Replace the database file with a directory so every connection fails
    std::fs::remove_file(store.path())?;
    let _ = std::fs::remove_file(dir.path().join("intake.db-wal"));
    let _ = std::fs::remove_file(dir.path().join("intake.db-shm"));
    std::fs::create_dir(store.path())?;

    match use_case.register("60123", None).await {
        RegistrationOutcome::StorageError { detail } => assert!(!detail.is_empty()),
        other => panic!("unexpected outcome {:?}", other),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_scans_create_exactly_once() -> Result<()> {
    let dir = tempdir()?;
    let store = seeded_store(&dir)?;
    let use_case = Arc::new(RegistrationUseCase::with_default_stage(store.clone()));

    let mut handles = Vec::new();
    for i in 0..16 {
        let use_case = use_case.clone();
        handles.push(tokio::spawn(async move {
            let stage = format!("Lector {}", i);
            use_case.register("60424242", Some(&stage)).await
        }));
    }

    let mut created = 0;
    let mut already = 0;
    for handle in handles {
        match handle.await? {
            RegistrationOutcome::Created { .. } => created += 1,
            RegistrationOutcome::AlreadyRegistered { .. } => already += 1,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(already, 15);
    assert!(store.find_registration("60424242")?.is_some());
    Ok(())
}
