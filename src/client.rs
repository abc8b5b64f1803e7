pub mod riot;

pub use riot::{Endpoint, FetchOutcome, RetryPolicy, RiotClient};
