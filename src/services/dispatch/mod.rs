//! Background delivery of pending recipients through a [`MailTransport`].

mod dispatcher;
mod transport;

pub use dispatcher::{Dispatcher, RunReport, TickReport};
pub use transport::{LogTransport, MailTransport, OutgoingMail, TransportError};
