use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::NamedTempFile;

mod common;
use common::{create_row, record, sig, write_journal};

#[test]
fn test_full_lifecycle_to_completed() {
    let file = NamedTempFile::new().unwrap();
    write_journal(
        file.path(),
        &[
            create_row("B1"),
            record(&[("action", "create_order"), ("booking", "B1")]),
            record(&[
                ("action", "verify"),
                ("order", "order_000001"),
                ("payment", "pay_1"),
                ("signature", &sig("order_000001", "pay_1")),
            ]),
            record(&[
                ("action", "forward"),
                ("role", "admin"),
                ("actor", "admin-1"),
                ("booking", "B1"),
                ("note", "organization verified"),
            ]),
            record(&[
                ("action", "accept"),
                ("role", "organization"),
                ("actor", "org-1"),
                ("booking", "B1"),
                ("note", "caregiver confirmed"),
            ]),
            record(&[
                ("action", "start"),
                ("role", "organization"),
                ("actor", "org-1"),
                ("booking", "B1"),
            ]),
            record(&[
                ("action", "complete"),
                ("role", "organization"),
                ("actor", "org-1"),
                ("booking", "B1"),
            ]),
        ],
    );

    let mut cmd = Command::new(cargo_bin!("carebook"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "booking,status,payment_status,total,refunded",
        ))
        .stdout(predicate::str::contains("B1,COMPLETED,completed,2000,0"));
}

#[test]
fn test_forward_before_payment_is_rejected() {
    let file = NamedTempFile::new().unwrap();
    write_journal(
        file.path(),
        &[
            create_row("B1"),
            record(&[
                ("action", "forward"),
                ("role", "admin"),
                ("actor", "admin-1"),
                ("booking", "B1"),
            ]),
        ],
    );

    let mut cmd = Command::new(cargo_bin!("carebook"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("invalid transition"))
        .stdout(predicate::str::contains("B1,AWAITING_PAYMENT,pending,2000,0"));
}

#[test]
fn test_cancel_after_payment_refunds() {
    let file = NamedTempFile::new().unwrap();
    write_journal(
        file.path(),
        &[
            create_row("B1"),
            record(&[("action", "create_order"), ("booking", "B1")]),
            record(&[
                ("action", "verify"),
                ("order", "order_000001"),
                ("payment", "pay_1"),
                ("signature", &sig("order_000001", "pay_1")),
            ]),
            record(&[
                ("action", "cancel"),
                ("role", "customer"),
                ("actor", "alice"),
                ("booking", "B1"),
                ("note", "no longer needed"),
            ]),
        ],
    );

    let mut cmd = Command::new(cargo_bin!("carebook"));
    cmd.arg(file.path());

    // Cancellation of a paid booking stays CANCELLED and the queued
    // refund settles the payment side.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("B1,CANCELLED,refunded,2000,2000"));
}

#[test]
fn test_org_reject_refunds_paid_booking() {
    let file = NamedTempFile::new().unwrap();
    write_journal(
        file.path(),
        &[
            create_row("B1"),
            record(&[("action", "create_order"), ("booking", "B1")]),
            record(&[
                ("action", "verify"),
                ("order", "order_000001"),
                ("payment", "pay_1"),
                ("signature", &sig("order_000001", "pay_1")),
            ]),
            record(&[
                ("action", "forward"),
                ("role", "admin"),
                ("actor", "admin-1"),
                ("booking", "B1"),
            ]),
            record(&[
                ("action", "reject"),
                ("role", "organization"),
                ("actor", "org-1"),
                ("booking", "B1"),
                ("note", "no caregiver available"),
            ]),
        ],
    );

    let mut cmd = Command::new(cargo_bin!("carebook"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("B1,CANCELLED,refunded,2000,2000"));
}

#[test]
fn test_unauthorized_actor_is_rejected() {
    let file = NamedTempFile::new().unwrap();
    write_journal(
        file.path(),
        &[
            create_row("B1"),
            // A different customer trying to cancel someone else's booking.
            record(&[
                ("action", "cancel"),
                ("role", "customer"),
                ("actor", "mallory"),
                ("booking", "B1"),
            ]),
        ],
    );

    let mut cmd = Command::new(cargo_bin!("carebook"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("unauthorized"))
        .stdout(predicate::str::contains("B1,AWAITING_PAYMENT,pending,2000,0"));
}

#[test]
fn test_two_bookings_are_isolated() {
    let file = NamedTempFile::new().unwrap();
    write_journal(
        file.path(),
        &[
            create_row("B1"),
            create_row("B2"),
            record(&[("action", "create_order"), ("booking", "B2")]),
            record(&[
                ("action", "verify"),
                ("order", "order_000001"),
                ("payment", "pay_1"),
                ("signature", &sig("order_000001", "pay_1")),
            ]),
        ],
    );

    let mut cmd = Command::new(cargo_bin!("carebook"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("B1,AWAITING_PAYMENT,pending,2000,0"))
        .stdout(predicate::str::contains(
            "B2,PAID_PENDING_ADMIN,completed,2000,0",
        ));
}
