use std::collections::VecDeque;

use cdc_config::shared::BufferKind;

/// Ordered container holding the events of one transaction.
///
/// The concrete container is picked from [`BufferKind`] by [`EventBuffer::new`].
#[derive(Debug, Clone)]
pub enum EventBuffer<T> {
    Vec(Vec<T>),
    Deque(VecDeque<T>),
}

impl<T> EventBuffer<T> {
    pub fn new(kind: BufferKind) -> Self {
        match kind {
            BufferKind::Vec => EventBuffer::Vec(Vec::new()),
            BufferKind::Deque => EventBuffer::Deque(VecDeque::new()),
        }
    }

    pub fn push(&mut self, item: T) {
        match self {
            EventBuffer::Vec(items) => items.push(item),
            EventBuffer::Deque(items) => items.push_back(item),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EventBuffer::Vec(items) => items.len(),
            EventBuffer::Deque(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            EventBuffer::Vec(items) => items,
            EventBuffer::Deque(items) => items.into(),
        }
    }
}
