//! Debounced, cached patient queries.

pub mod cache;
pub mod debounce;
pub mod key;
pub mod patients;

pub use cache::{FetchStatus, QueryCache, QueryOptions, QueryState};
pub use key::QueryKey;
pub use patients::{LoadingPolicy, PatientListState, PatientQueries};
