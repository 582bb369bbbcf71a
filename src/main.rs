use carebook::application::engine::BookingEngine;
use carebook::application::incidents::{DisputeOutcome, IncidentResolver};
use carebook::application::reconciliation::PaymentReconciliation;
use carebook::domain::actor::{Actor, Role};
use carebook::domain::booking::{Amount, NewBooking, Schedule};
use carebook::domain::incident::{IncidentKind, IncidentStatus, NewIncident, Severity};
use carebook::domain::payment::WebhookEvent;
use carebook::domain::ports::{
    BookingStoreRef, IncidentStoreRef, PaymentGatewayRef, PaymentStoreRef,
};
use carebook::error::CareError;
use carebook::infrastructure::gateway::SandboxGateway;
use carebook::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryIncidentStore, InMemoryPaymentStore,
};
use carebook::interfaces::csv::command_reader::{Command, CommandAction, CommandReader};
use carebook::interfaces::csv::report_writer::BookingReportWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input command journal CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Shared secret used to verify payment confirmation signatures.
    #[arg(long, env = "CAREBOOK_WEBHOOK_SECRET", default_value = "sandbox-secret")]
    webhook_secret: String,
}

struct Services {
    engine: BookingEngine,
    reconciliation: PaymentReconciliation,
    resolver: IncidentResolver,
    bookings: BookingStoreRef,
}

fn assemble(
    bookings: BookingStoreRef,
    payments: PaymentStoreRef,
    incidents: IncidentStoreRef,
    secret: &str,
) -> Services {
    let gateway: PaymentGatewayRef = Arc::new(SandboxGateway::new());
    let reconciliation =
        PaymentReconciliation::new(bookings.clone(), payments.clone(), gateway, secret);
    let engine = BookingEngine::new(bookings.clone(), payments, reconciliation.clone());
    let resolver = IncidentResolver::new(incidents, bookings.clone(), reconciliation.clone());
    Services {
        engine,
        reconciliation,
        resolver,
        bookings,
    }
}

#[cfg(feature = "storage-rocksdb")]
fn persistent_services(db_path: &std::path::Path, secret: &str) -> Result<Services> {
    use carebook::infrastructure::rocksdb::RocksDBStore;
    let store = RocksDBStore::open(db_path).into_diagnostic()?;
    Ok(assemble(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store),
        secret,
    ))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn persistent_services(_db_path: &std::path::Path, _secret: &str) -> Result<Services> {
    Err(miette::miette!(
        "persistent storage requires building with the storage-rocksdb feature"
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let services = if let Some(db_path) = cli.db_path.as_deref() {
        persistent_services(db_path, &cli.webhook_secret)?
    } else {
        assemble(
            Arc::new(InMemoryBookingStore::new()),
            Arc::new(InMemoryPaymentStore::new()),
            Arc::new(InMemoryIncidentStore::new()),
            &cli.webhook_secret,
        )
    };

    // Replay the journal one command at a time, the way independent
    // request handlers would hit the engine.
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command_result in reader.commands() {
        match command_result {
            Ok(command) => {
                if let Err(e) = dispatch(&services, command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    // Output the final booking ledger.
    let bookings = services.bookings.all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BookingReportWriter::new(stdout.lock());
    writer.write_bookings(bookings).into_diagnostic()?;

    Ok(())
}

async fn dispatch(services: &Services, cmd: Command) -> carebook::error::Result<()> {
    match cmd.action {
        CommandAction::Create => {
            let actor = actor_of(&cmd)?;
            let params = NewBooking {
                id: require(cmd.booking, "booking")?,
                customer_id: require(cmd.customer, "customer")?,
                caregiver_id: require(cmd.caregiver, "caregiver")?,
                organization_id: require(cmd.org, "org")?,
                schedule: Schedule {
                    start_date: require(cmd.start_date, "start_date")?,
                    end_date: require(cmd.end_date, "end_date")?,
                    start_time: require(cmd.start_time, "start_time")?,
                    end_time: require(cmd.end_time, "end_time")?,
                    duration_hours: require(cmd.hours, "hours")?,
                },
                hourly_rate: Amount::new(require(cmd.rate, "rate")?)?,
                currency: cmd.currency.unwrap_or_else(|| "INR".to_string()),
            };
            services.engine.create_booking(&actor, params).await?;
        }
        CommandAction::CreateOrder => {
            let booking = require(cmd.booking, "booking")?;
            services.reconciliation.create_order(&booking).await?;
        }
        CommandAction::Verify => {
            services
                .reconciliation
                .verify_payment(
                    &require(cmd.order, "order")?,
                    &require(cmd.payment, "payment")?,
                    &require(cmd.signature, "signature")?,
                )
                .await?;
        }
        CommandAction::Webhook => {
            let event = WebhookEvent {
                event_id: require(cmd.event_id, "event_id")?,
                kind: require(cmd.event, "event")?,
                order_id: require(cmd.order, "order")?,
                payment_ref: require(cmd.payment, "payment")?,
                amount: require(cmd.amount, "amount")?,
            };
            services.reconciliation.handle_webhook(&event).await?;
        }
        CommandAction::Forward => {
            let actor = actor_of(&cmd)?;
            let booking = require(cmd.booking, "booking")?;
            let notes = cmd.note.unwrap_or_default();
            services.engine.forward_to_org(&actor, &booking, &notes).await?;
        }
        CommandAction::Accept => {
            let actor = actor_of(&cmd)?;
            let booking = require(cmd.booking, "booking")?;
            let notes = cmd.note.unwrap_or_default();
            services.engine.org_accept(&actor, &booking, &notes).await?;
        }
        CommandAction::Reject => {
            let actor = actor_of(&cmd)?;
            let booking = require(cmd.booking, "booking")?;
            let reason = cmd.note.unwrap_or_else(|| "rejected".to_string());
            services.engine.org_reject(&actor, &booking, &reason).await?;
        }
        CommandAction::Start => {
            let actor = actor_of(&cmd)?;
            let booking = require(cmd.booking, "booking")?;
            services.engine.start_service(&actor, &booking).await?;
        }
        CommandAction::Complete => {
            let actor = actor_of(&cmd)?;
            let booking = require(cmd.booking, "booking")?;
            services.engine.complete_service(&actor, &booking).await?;
        }
        CommandAction::Cancel => {
            let actor = actor_of(&cmd)?;
            let booking = require(cmd.booking, "booking")?;
            let reason = cmd.note.unwrap_or_else(|| "cancelled".to_string());
            services.engine.cancel(&actor, &booking, &reason).await?;
        }
        CommandAction::Dispute => {
            let actor = actor_of(&cmd)?;
            let booking = require(cmd.booking, "booking")?;
            services.engine.dispute(&actor, &booking).await?;
        }
        CommandAction::Report => {
            let actor = actor_of(&cmd)?;
            let params = NewIncident {
                booking_id: require(cmd.booking, "booking")?,
                reporter_id: actor.id.clone(),
                against_id: cmd.caregiver.unwrap_or_default(),
                kind: cmd.kind.unwrap_or(IncidentKind::Other),
                severity: cmd.severity.unwrap_or(Severity::Medium),
                description: cmd.note.unwrap_or_default(),
                evidence: Vec::new(),
            };
            services.resolver.report(&actor, params).await?;
        }
        CommandAction::Investigate => {
            let actor = actor_of(&cmd)?;
            let incident = open_incident(services, &require(cmd.booking, "booking")?).await?;
            services.resolver.begin_investigation(&actor, &incident).await?;
        }
        CommandAction::Resolve => {
            let actor = actor_of(&cmd)?;
            let incident = open_incident(services, &require(cmd.booking, "booking")?).await?;
            let outcome = match cmd.outcome.as_deref() {
                Some("cancel") => DisputeOutcome::Cancel,
                _ => DisputeOutcome::Reinstate,
            };
            services
                .resolver
                .resolve(
                    &actor,
                    &incident,
                    require(cmd.resolution, "resolution")?,
                    cmd.note.as_deref().unwrap_or(""),
                    outcome,
                )
                .await?;
        }
        CommandAction::Dismiss => {
            let actor = actor_of(&cmd)?;
            let incident = open_incident(services, &require(cmd.booking, "booking")?).await?;
            let notes = cmd.note.unwrap_or_default();
            services.resolver.dismiss(&actor, &incident, &notes).await?;
        }
        CommandAction::Refund => {
            let actor = actor_of(&cmd)?;
            let booking = require(cmd.booking, "booking")?;
            services
                .engine
                .refund(&actor, &booking, cmd.amount, cmd.note)
                .await?;
        }
    }
    Ok(())
}

/// The earliest still-open incident filed against a booking.
async fn open_incident(
    services: &Services,
    booking_id: &str,
) -> carebook::error::Result<String> {
    let mut incidents = services.resolver.for_booking(booking_id).await?;
    incidents.sort_by(|a, b| a.reported_at.cmp(&b.reported_at));
    incidents
        .into_iter()
        .find(|i| {
            matches!(
                i.status(),
                IncidentStatus::Reported | IncidentStatus::UnderInvestigation
            )
        })
        .map(|i| i.id)
        .ok_or_else(|| CareError::NotFound(format!("open incident for booking {booking_id}")))
}

fn actor_of(cmd: &Command) -> carebook::error::Result<Actor> {
    let role = require(cmd.role, "role")?;
    let id = require(cmd.actor.clone(), "actor")?;
    if role == Role::System {
        return Err(CareError::Validation(
            "the system role cannot be assumed from the journal".to_string(),
        ));
    }
    Ok(Actor { id, role })
}

fn require<T>(value: Option<T>, column: &str) -> carebook::error::Result<T> {
    value.ok_or_else(|| CareError::Validation(format!("missing required column '{column}'")))
}
