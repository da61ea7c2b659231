pub mod client;

pub use client::{CreateTransactionRequest, GatewayError, JunoPayClient, ProviderTransaction};
