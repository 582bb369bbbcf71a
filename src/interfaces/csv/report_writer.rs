use crate::domain::booking::Booking;
use crate::error::Result;
use rust_decimal::Decimal;
use std::io::Write;

/// Writes the final booking ledger as CSV.
///
/// One row per booking, sorted by id so the output is stable across runs:
/// `booking,status,payment_status,total,refunded`.
pub struct BookingReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BookingReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_bookings(&mut self, mut bookings: Vec<Booking>) -> Result<()> {
        bookings.sort_by(|a, b| a.id.cmp(&b.id));

        self.writer
            .write_record(["booking", "status", "payment_status", "total", "refunded"])?;
        for booking in bookings {
            self.writer.write_record([
                booking.id.clone(),
                booking.status().to_string(),
                booking.payment.status.to_string(),
                booking.pricing.total_amount.to_string(),
                booking.refund_amount.unwrap_or(Decimal::ZERO).to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
