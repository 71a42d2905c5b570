//! Internal data structures backing the eviction policies and the
//! single-flight table.

pub mod flight;
pub mod lazy_heap;

pub use flight::{FlightGuard, FlightTable, Joined};
pub use lazy_heap::LazyMinHeap;
