//! Back-office client: the REST client, the inventory cache built on it, and session
//! liveness polling.

pub mod cache;
pub mod http;
pub mod session;

pub use cache::{InventoryCache, InventoryTotals, ListQuery, ReloadScope, SortKey};
pub use http::BackOfficeClient;
pub use session::{SessionEvent, SessionWatch};
