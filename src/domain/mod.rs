pub mod bid;
pub mod transaction;

pub use bid::{Bid, BidComment, BidStatus, NegotiationEntry, PartyRole};
pub use transaction::{OrderAction, OrderStatus, Transaction, compute_buyer_fee};
