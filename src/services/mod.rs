pub mod catalog;
pub mod checkout;
pub mod customers;
pub mod orders;
pub mod webhooks;
