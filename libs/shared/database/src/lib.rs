pub mod clock;
pub mod identity;
pub mod memory;
pub mod postgrest;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use identity::{IdentityResolver, StaticDirectory};
pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use store::{SchedulingStore, StoreError};
