pub mod clients;
pub mod invoices;
pub mod uploads;
pub mod users;
