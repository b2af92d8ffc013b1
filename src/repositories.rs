pub mod clients;
pub mod invoices;
pub mod storage;
pub mod users;
