pub mod linucb;
pub mod store;

pub use linucb::LinUcb;
pub use store::{BanditStore, CapacityPolicy};
