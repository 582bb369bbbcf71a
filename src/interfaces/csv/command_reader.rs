use crate::domain::actor::Role;
use crate::domain::incident::{IncidentKind, ResolutionAction, Severity};
use crate::domain::payment::WebhookKind;
use crate::error::{CareError, Result};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of the booking command journal.
///
/// The journal is a wide CSV: every command shares the same header and
/// fills only the columns it needs, the rest stay empty. This mirrors how
/// the independent request handlers would call the engine, one command at
/// a time.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub action: CommandAction,
    pub role: Option<Role>,
    pub actor: Option<String>,
    pub booking: Option<String>,
    pub customer: Option<String>,
    pub caregiver: Option<String>,
    pub org: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub hours: Option<u32>,
    pub rate: Option<Decimal>,
    pub currency: Option<String>,
    pub order: Option<String>,
    pub payment: Option<String>,
    pub signature: Option<String>,
    pub event: Option<WebhookKind>,
    pub event_id: Option<String>,
    pub amount: Option<Decimal>,
    pub kind: Option<IncidentKind>,
    pub severity: Option<Severity>,
    pub resolution: Option<ResolutionAction>,
    pub outcome: Option<String>,
    pub note: Option<String>,
}

/// The column header every journal file starts with.
pub const JOURNAL_HEADER: [&str; 25] = [
    "action",
    "role",
    "actor",
    "booking",
    "customer",
    "caregiver",
    "org",
    "start_date",
    "end_date",
    "start_time",
    "end_time",
    "hours",
    "rate",
    "currency",
    "order",
    "payment",
    "signature",
    "event",
    "event_id",
    "amount",
    "kind",
    "severity",
    "resolution",
    "outcome",
    "note",
];

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Create,
    CreateOrder,
    Verify,
    Webhook,
    Forward,
    Accept,
    Reject,
    Start,
    Complete,
    Cancel,
    Dispute,
    Report,
    Investigate,
    Resolve,
    Dismiss,
    Refund,
}

/// Reads commands from a CSV source.
///
/// Wraps `csv::Reader` and yields an iterator of `Result<Command>`, with
/// whitespace trimming and flexible record lengths, so a malformed row can
/// be reported and skipped without stopping the replay.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g. File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes commands in journal order.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CareError::from))
    }
}
