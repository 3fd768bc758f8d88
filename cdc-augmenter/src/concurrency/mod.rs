//! Concurrency primitives shared by the coordinator and the apply loop.

pub mod shutdown;
