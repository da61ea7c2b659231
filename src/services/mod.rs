pub mod negotiation;
pub mod orders;

pub use negotiation::NegotiationService;
pub use orders::{InitiateOrder, OrderService, OrderView, RepairOutcome};
