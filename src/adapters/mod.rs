pub mod postgres_bid_repository;
pub mod postgres_marketplace;
pub mod postgres_transaction_repository;

pub use postgres_bid_repository::PostgresBidRepository;
pub use postgres_marketplace::PostgresMarketplace;
pub use postgres_transaction_repository::PostgresTransactionRepository;
