#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::process::Command;
use tempfile::{NamedTempFile, tempdir};

mod common;
use common::{create_row, record, sig, write_journal};

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: create the booking and complete checkout.
    let journal1 = NamedTempFile::new().unwrap();
    write_journal(
        journal1.path(),
        &[
            create_row("B1"),
            record(&[("action", "create_order"), ("booking", "B1")]),
            record(&[
                ("action", "verify"),
                ("order", "order_000001"),
                ("payment", "pay_1"),
                ("signature", &sig("order_000001", "pay_1")),
            ]),
        ],
    );

    let mut cmd1 = Command::new(cargo_bin!("carebook"));
    cmd1.arg(journal1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("B1,PAID_PENDING_ADMIN,completed,2000,0"));

    // 2. Second run against the same database picks up where we left off.
    let journal2 = NamedTempFile::new().unwrap();
    write_journal(
        journal2.path(),
        &[record(&[
            ("action", "forward"),
            ("role", "admin"),
            ("actor", "admin-1"),
            ("booking", "B1"),
            ("note", "organization verified"),
        ])],
    );

    let mut cmd2 = Command::new(cargo_bin!("carebook"));
    cmd2.arg(journal2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout2.contains("B1,FORWARDED_TO_ORG,completed,2000,0"));
}

#[test]
fn test_webhook_dedup_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("dedup_db");

    let webhook = record(&[
        ("action", "webhook"),
        ("order", "order_000001"),
        ("payment", "pay_1"),
        ("event", "payment.captured"),
        ("event_id", "evt_1"),
        ("amount", "2000"),
    ]);

    let journal1 = NamedTempFile::new().unwrap();
    write_journal(
        journal1.path(),
        &[
            create_row("B1"),
            record(&[("action", "create_order"), ("booking", "B1")]),
            webhook.clone(),
        ],
    );

    let mut cmd1 = Command::new(cargo_bin!("carebook"));
    cmd1.arg(journal1.path()).arg("--db-path").arg(&db_path);
    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    assert!(
        String::from_utf8_lossy(&output1.stdout).contains("B1,PAID_PENDING_ADMIN,completed,2000,0")
    );

    // The same event re-delivered in a later run is still a no-op.
    let journal2 = NamedTempFile::new().unwrap();
    write_journal(journal2.path(), &[webhook]);

    let mut cmd2 = Command::new(cargo_bin!("carebook"));
    cmd2.arg(journal2.path()).arg("--db-path").arg(&db_path);
    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stderr2 = String::from_utf8_lossy(&output2.stderr);
    assert!(!stderr2.contains("Error processing command"));
    assert!(
        String::from_utf8_lossy(&output2.stdout).contains("B1,PAID_PENDING_ADMIN,completed,2000,0")
    );
}
