pub mod resolve_query;

pub use resolve_query::{FailureReason, Outcome, QueryState, Resolution, ResolveQueryUseCase};
