mod coordinator;
mod pipeline;
