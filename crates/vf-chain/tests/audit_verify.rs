//! Signed audit entries re-derived against the ledger.

use vf_aeat::MockSubmitter;
use vf_core::{Amount, FiscalIdentifier, HashedAt, InvoiceNumber, IssueDate, RecordKind, TaxId, TaxRate};
use vf_crypto::{ArtifactStore, AuditKeyPair};
use vf_record::{
    BreakdownDefaults, ComputerSystem, HostInvoiceKind, InvoiceSnapshot, InvoiceStatus,
    SnapshotLine,
};
use vf_chain::{
    AuditLog, AuditLogEntry, AuditRecorder, ChainEngine, EngineSettings, Hooks, MemoryLedger,
    VerificationResult,
};

const SEED: [u8; 32] = [42u8; 32];

fn settings() -> EngineSettings {
    EngineSettings {
        issuer: FiscalIdentifier::new("Emisor SL", TaxId::new("B12345678").unwrap()).unwrap(),
        representative: None,
        system: ComputerSystem {
            vendor: FiscalIdentifier::new("Software SL", TaxId::new("B87654321").unwrap())
                .unwrap(),
            name: "vf".into(),
            id: "VF".into(),
            version: "0.1.0".into(),
            installation_number: "1".into(),
            only_supports_verifactu: true,
            supports_multiple_taxpayers: false,
            has_multiple_taxpayers: false,
        },
        defaults: BreakdownDefaults::default(),
    }
}

fn snapshot(number: &str, tax: &str) -> InvoiceSnapshot {
    InvoiceSnapshot {
        host_ref: number.to_string(),
        issuer: settings().issuer,
        number: InvoiceNumber::new(number).unwrap(),
        issue_date: IssueDate::from_ymd(2024, 5, 1).unwrap(),
        kind: HostInvoiceKind::Simplified,
        status: InvoiceStatus::Draft,
        third_party: None,
        lines: vec![SnapshotLine {
            base_amount: Amount::parse("100.00").unwrap(),
            tax_rate: TaxRate::parse("21.00").unwrap(),
            tax_amount: Amount::parse(tax).unwrap(),
            tax_type: None,
            regime: None,
            operation: None,
        }],
        description: Some("Venta mostrador".into()),
        corrected_source: None,
        replaced_invoices: Vec::new(),
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    log: AuditLog,
    engine: ChainEngine<MemoryLedger, MockSubmitter>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let log = AuditLog::new(dir.path().join("audit"));
    let mut hooks = Hooks::new();
    hooks.add_post(AuditRecorder::new(log.clone(), AuditKeyPair::from_seed(&SEED)));
    let engine = ChainEngine::new(
        settings(),
        MemoryLedger::new(),
        ArtifactStore::new(dir.path().join("artifacts")),
        MockSubmitter::accepting(),
    )
    .unwrap()
    .with_hooks(hooks)
    .with_clock(|| HashedAt::parse("2024-05-01T12:00:00+02:00").unwrap());
    Fixture {
        _dir: dir,
        log,
        engine,
    }
}

fn stored_entry(f: &Fixture, number: &str) -> AuditLogEntry {
    let id = snapshot(number, "21.00").invoice_id();
    f.log.get(&id, RecordKind::Registration).unwrap().unwrap()
}

#[test]
fn recorded_snapshot_reproduces_stored_hash() {
    let f = fixture();
    let receipt = f.engine.register(&snapshot("T-0001", "21.00")).unwrap();
    assert!(receipt.hook_errors.is_empty());
    f.engine.register(&snapshot("T-0002", "21.00")).unwrap();

    let key = AuditKeyPair::from_seed(&SEED).public_key();
    let verifier = f.engine.verifier(key);
    for number in ["T-0001", "T-0002"] {
        let result = verifier.verify(&stored_entry(&f, number)).unwrap();
        assert!(result.is_match(), "{number}: {result:?}");
    }
    assert_eq!(
        verifier.verify(&stored_entry(&f, "T-0001")).unwrap(),
        VerificationResult::Match {
            hash: receipt.record().hash().clone()
        }
    );
}

#[test]
fn altered_snapshot_fails_signature_check() {
    let f = fixture();
    f.engine.register(&snapshot("T-0001", "21.00")).unwrap();
    let mut entry = stored_entry(&f, "T-0001");
    entry.snapshot.lines[0].tax_amount = Amount::parse("20.00").unwrap();

    let key = AuditKeyPair::from_seed(&SEED).public_key();
    let result = f.engine.verifier(key).verify(&entry).unwrap();
    assert!(matches!(result, VerificationResult::SignatureInvalid { .. }), "{result:?}");
}

#[test]
fn re_signed_altered_snapshot_fails_hash_check() {
    let f = fixture();
    let receipt = f.engine.register(&snapshot("T-0001", "21.00")).unwrap();
    let key = AuditKeyPair::from_seed(&SEED);
    let forged =
        AuditLogEntry::sign(RecordKind::Registration, snapshot("T-0001", "21.02"), &key).unwrap();

    match f.engine.verifier(key.public_key()).verify(&forged).unwrap() {
        VerificationResult::HashMismatch {
            stored, recomputed, ..
        } => {
            assert_eq!(&stored, receipt.record().hash());
            assert!(recomputed.is_some());
            assert_ne!(recomputed.as_ref(), Some(&stored));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn snapshot_that_no_longer_builds_reports_no_recomputed_hash() {
    let f = fixture();
    f.engine.register(&snapshot("T-0001", "21.00")).unwrap();
    let key = AuditKeyPair::from_seed(&SEED);
    let forged =
        AuditLogEntry::sign(RecordKind::Registration, snapshot("T-0001", "30.00"), &key).unwrap();

    match f.engine.verifier(key.public_key()).verify(&forged).unwrap() {
        VerificationResult::HashMismatch { recomputed, reason, .. } => {
            assert!(recomputed.is_none());
            assert!(reason.contains("valid record"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn untrusted_key_fails_closed() {
    let f = fixture();
    f.engine.register(&snapshot("T-0001", "21.00")).unwrap();
    let other = AuditKeyPair::from_seed(&[1u8; 32]).public_key();

    let result = f.engine.verifier(other).verify(&stored_entry(&f, "T-0001")).unwrap();
    assert!(matches!(result, VerificationResult::SignatureInvalid { .. }));
}

#[test]
fn entry_without_persisted_record_is_not_found() {
    let f = fixture();
    let key = AuditKeyPair::from_seed(&SEED);
    let entry =
        AuditLogEntry::sign(RecordKind::Registration, snapshot("T-0099", "21.00"), &key).unwrap();

    let result = f.engine.verifier(key.public_key()).verify(&entry).unwrap();
    assert_eq!(result, VerificationResult::NotFound);
}
