use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::metrics::RegistrationMetrics;
use crate::parser;
use crate::storage::{RegistryStore, StoreResult};
use crate::types::{normalize_stage, ParsedCode, Registration, DEFAULT_STAGE};

/// Result of one registration attempt. Every path through
/// [`RegistrationUseCase::register`] ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Created { barcode: String, stage: String },
    AlreadyRegistered { barcode: String, stage: String },
    Rejected(Rejection),
    StorageError { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    /// The code does not match either label shape; carries the validation message
    InvalidCode(String),
    /// The code is well formed but no reference row exists; carries the category code
    UnknownCategory(String),
}

impl RegistrationOutcome {
    /// Stable label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::Rejected(Rejection::InvalidCode(_)) => "invalid_code",
            Self::Rejected(Rejection::UnknownCategory(_)) => "unknown_category",
            Self::StorageError { .. } => "storage_error",
        }
    }
}

/// Use case for registering a scanned code against the registry store
pub struct RegistrationUseCase {
    store: Arc<dyn RegistryStore>,
    default_stage: String,
}

impl RegistrationUseCase {
    pub fn new(store: Arc<dyn RegistryStore>, default_stage: impl Into<String>) -> Self {
        Self {
            store,
            default_stage: default_stage.into(),
        }
    }

    /// Create a use case that labels stage-less scans as "Ingreso"
    pub fn with_default_stage(store: Arc<dyn RegistryStore>) -> Self {
        Self::new(store, DEFAULT_STAGE)
    }

    /// Register `raw_code` at `raw_stage`.
    ///
    /// The reference lookup and the insert run in one store transaction on the
    /// blocking pool. A repeated barcode is reported as `AlreadyRegistered` and
    /// leaves the stored row untouched.
    pub async fn register(&self, raw_code: &str, raw_stage: Option<&str>) -> RegistrationOutcome {
        let started = Instant::now();
        let stage = normalize_stage(raw_stage, &self.default_stage);

        let outcome = match parser::parse(raw_code) {
            Err(e) => {
                debug!("Rejected scan {:?}: {}", e.input, e);
                RegistrationOutcome::Rejected(Rejection::InvalidCode(e.to_string()))
            }
            Ok(parsed) => {
                let store = self.store.clone();
                match tokio::task::spawn_blocking(move || register_parsed(store.as_ref(), parsed, stage))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => RegistrationOutcome::StorageError {
                        detail: format!("registration task failed: {e}"),
                    },
                }
            }
        };

        log_outcome(&outcome);
        RegistrationMetrics::record_outcome(outcome.label(), started.elapsed());
        outcome
    }
}

/// Run the transactional part of a registration for an already parsed code
pub fn register_parsed(
    store: &dyn RegistryStore,
    parsed: ParsedCode,
    stage: String,
) -> RegistrationOutcome {
    match insert_in_transaction(store, &parsed, &stage) {
        Ok(None) => RegistrationOutcome::Rejected(Rejection::UnknownCategory(parsed.category_code)),
        Ok(Some(true)) => RegistrationOutcome::Created {
            barcode: parsed.barcode,
            stage,
        },
        Ok(Some(false)) => RegistrationOutcome::AlreadyRegistered {
            barcode: parsed.barcode,
            stage,
        },
        Err(e) => RegistrationOutcome::StorageError {
            detail: e.to_string(),
        },
    }
}

/// `None` when the category is unknown, otherwise whether a row was inserted.
/// Early returns drop the transaction, which rolls it back.
fn insert_in_transaction(
    store: &dyn RegistryStore,
    parsed: &ParsedCode,
    stage: &str,
) -> StoreResult<Option<bool>> {
    let mut tx = store.begin()?;

    let Some(category) = tx.find_category(&parsed.category_code)? else {
        tx.rollback()?;
        return Ok(None);
    };

    let registration = Registration::new(parsed, &category, stage, Utc::now());
    let inserted = tx.insert_if_absent(&registration)?;
    tx.commit()?;

    Ok(Some(inserted))
}

fn log_outcome(outcome: &RegistrationOutcome) {
    match outcome {
        RegistrationOutcome::Created { barcode, stage } => {
            info!(barcode = %barcode, stage = %stage, "Registered code");
        }
        RegistrationOutcome::AlreadyRegistered { barcode, stage } => {
            info!(barcode = %barcode, stage = %stage, "Code already registered");
        }
        RegistrationOutcome::Rejected(Rejection::UnknownCategory(code)) => {
            warn!(category = %code, "Unknown category");
        }
        RegistrationOutcome::Rejected(Rejection::InvalidCode(_)) => {}
        RegistrationOutcome::StorageError { detail } => {
            error!("Registration failed: {}", detail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStore, RegistryTransaction, StoreError};
    use crate::types::CategoryReference;

    fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for code in ["A1", "60"] {
            store
                .upsert_category(&CategoryReference {
                    category_code: code.to_string(),
                    variety: "Freedom".to_string(),
                    block: "4".to_string(),
                    size: Some("NA".to_string()),
                    stem_count: 25,
                })
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_letter_code_with_default_stage() {
        let use_case = RegistrationUseCase::with_default_stage(seeded_store());

        let outcome = use_case.register("a1123456", None).await;

        assert_eq!(
            outcome,
            RegistrationOutcome::Created {
                barcode: "A1123456".to_string(),
                stage: "Ingreso".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_repeat_keeps_first_stage() {
        let store = seeded_store();
        let use_case = RegistrationUseCase::with_default_stage(store.clone());

        let first = use_case.register("60123456", Some("Cuarto Frio")).await;
        let second = use_case.register("60123456", Some("Despacho")).await;

        assert_eq!(first.label(), "created");
        assert_eq!(
            second,
            RegistrationOutcome::AlreadyRegistered {
                barcode: "60123456".to_string(),
                stage: "Despacho".to_string(),
            }
        );
        let stored = store.find_registration("60123456").unwrap().unwrap();
        assert_eq!(stored.stage, "Cuarto Frio");
        assert_eq!(store.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_code_is_rejected() {
        let use_case = RegistrationUseCase::with_default_stage(seeded_store());

        match use_case.register("abc", Some("Ingreso")).await {
            RegistrationOutcome::Rejected(Rejection::InvalidCode(message)) => {
                assert!(message.starts_with("invalid code"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let store = seeded_store();
        let use_case = RegistrationUseCase::with_default_stage(store.clone());

        let outcome = use_case.register("991234", None).await;

        assert_eq!(
            outcome,
            RegistrationOutcome::Rejected(Rejection::UnknownCategory("99".to_string()))
        );
        assert_eq!(store.registration_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_default_stage() {
        let use_case = RegistrationUseCase::new(seeded_store(), "Intake");
        match use_case.register("60777", Some("  ")).await {
            RegistrationOutcome::Created { stage, .. } => assert_eq!(stage, "Intake"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    /// Store whose commits fail, to exercise the rollback path
    struct FailingCommitStore {
        inner: InMemoryStore,
    }

    struct FailingCommitTransaction {
        inner: Box<dyn RegistryTransaction>,
    }

    impl RegistryStore for FailingCommitStore {
        fn begin(&self) -> StoreResult<Box<dyn RegistryTransaction>> {
            Ok(Box::new(FailingCommitTransaction {
                inner: self.inner.begin()?,
            }))
        }

        fn upsert_category(&self, category: &CategoryReference) -> StoreResult<()> {
            self.inner.upsert_category(category)
        }

        fn find_registration(&self, barcode: &str) -> StoreResult<Option<Registration>> {
            self.inner.find_registration(barcode)
        }
    }

    impl RegistryTransaction for FailingCommitTransaction {
        fn find_category(&mut self, category_code: &str) -> StoreResult<Option<CategoryReference>> {
            self.inner.find_category(category_code)
        }

        fn insert_if_absent(&mut self, registration: &Registration) -> StoreResult<bool> {
            self.inner.insert_if_absent(registration)
        }

        fn commit(self: Box<Self>) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }

        fn rollback(self: Box<Self>) -> StoreResult<()> {
            self.inner.rollback()
        }
    }

    #[tokio::test]
    async fn test_failed_commit_reports_storage_error_and_discards_insert() {
        let inner = InMemoryStore::new();
        inner
            .upsert_category(&CategoryReference {
                category_code: "60".to_string(),
                variety: "Mondial".to_string(),
                block: "1".to_string(),
                size: None,
                stem_count: 20,
            })
            .unwrap();
        let store = Arc::new(FailingCommitStore {
            inner: inner.clone(),
        });
        let use_case = RegistrationUseCase::with_default_stage(store);

        let outcome = use_case.register("60123", None).await;

        assert_eq!(
            outcome,
            RegistrationOutcome::StorageError {
                detail: "store unavailable: connection reset".to_string(),
            }
        );
        assert!(inner.find_registration("60123").unwrap().is_none());
    }

    #[test]
    fn test_outcome_serializes_with_tags() {
        let value = serde_json::to_value(RegistrationOutcome::Rejected(Rejection::UnknownCategory(
            "99".to_string(),
        )))
        .unwrap();
        assert_eq!(value["outcome"], "rejected");
        assert_eq!(value["reason"], "unknown_category");
        assert_eq!(value["detail"], "99");
    }
}
