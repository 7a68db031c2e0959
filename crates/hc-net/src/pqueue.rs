//! Indexed binary min-heap of request deadlines.

use crate::http::RequestId;
use std::collections::HashMap;
use std::time::Instant;

/// Stable reference to a pushed deadline, used to remove it before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeadlineHandle(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineItem {
    pub request: RequestId,
    pub deadline: Instant,
    handle: DeadlineHandle,
}

impl DeadlineItem {
    pub fn handle(&self) -> DeadlineHandle {
        self.handle
    }
}

/// Min-heap keyed by absolute deadline.
///
/// `positions` tracks where every live item sits in `heap`; an item that has
/// fired or been removed has no position, which makes removal idempotent.
#[derive(Debug, Default)]
pub struct DeadlineQueue {
    heap: Vec<DeadlineItem>,
    positions: HashMap<DeadlineHandle, usize>,
    next_handle: u64,
}

impl DeadlineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
            next_handle: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn push(&mut self, request: RequestId, deadline: Instant) -> DeadlineHandle {
        let handle = DeadlineHandle(self.next_handle);
        self.next_handle += 1;

        let index = self.heap.len();
        self.heap.push(DeadlineItem {
            request,
            deadline,
            handle,
        });
        self.positions.insert(handle, index);
        self.sift_up(index);
        handle
    }

    pub fn peek(&self) -> Option<&DeadlineItem> {
        self.heap.first()
    }

    /// Pops the earliest item if its deadline is at or before `now`.
    pub fn peek_and_shift(&mut self, now: Instant) -> Option<DeadlineItem> {
        if self.heap.first()?.deadline > now {
            return None;
        }

        self.remove_at(0)
    }

    /// Removes an item before it fires. Returns `None` if it already left
    /// the queue.
    pub fn remove(&mut self, handle: DeadlineHandle) -> Option<DeadlineItem> {
        let index = self.index_of(handle)?;
        self.remove_at(index)
    }

    /// Current heap slot of `handle`, or `None` once it has fired or been removed.
    pub fn index_of(&self, handle: DeadlineHandle) -> Option<usize> {
        self.positions.get(&handle).copied()
    }

    fn remove_at(&mut self, index: usize) -> Option<DeadlineItem> {
        let last = self.heap.len().checked_sub(1)?;
        if index > last {
            return None;
        }

        self.swap(index, last);
        let item = self.heap.pop()?;
        self.positions.remove(&item.handle);

        if index < self.heap.len() {
            self.sift_down(index);
            self.sift_up(index);
        }

        Some(item)
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[parent].deadline <= self.heap[index].deadline {
                break;
            }
            self.swap(parent, index);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }

            let right = left + 1;
            let smallest = if right < len && self.heap[right].deadline < self.heap[left].deadline {
                right
            } else {
                left
            };

            if self.heap[index].deadline <= self.heap[smallest].deadline {
                break;
            }
            self.swap(index, smallest);
            index = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].handle, a);
        self.positions.insert(self.heap[b].handle, b);
    }
}
