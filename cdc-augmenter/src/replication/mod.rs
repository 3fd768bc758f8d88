//! Processing of the replicated event stream.

mod apply;

pub use apply::{ApplyLoop, ApplyLoopResult};
