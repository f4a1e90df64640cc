//! Priority-aware task queue with batching views.
//!
//! Tasks are ordered by `(priority, deadline)`, lowest first. Two dequeue
//! views exist: a destructive typed pop and a non-destructive model-grouped
//! snapshot used by the planner (soft peek: tasks that exceed a group's
//! token cap are left in the queue but omitted from the snapshot).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::router::TaskType;

use super::task::LlmTask;

/// Heap entry ordered by the task's queue key only.
struct QueueEntry(LlmTask);

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.queue_key() == other.0.queue_key()
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.queue_key().cmp(&other.0.queue_key())
    }
}

/// Min-ordered queue of pending LLM tasks.
#[derive(Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
}

impl TaskQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts a task.
    pub fn add_task(&mut self, task: LlmTask) {
        self.heap.push(Reverse(QueueEntry(task)));
    }

    /// Removes and returns up to `batch_size` tasks in priority order.
    ///
    /// When `task_type` is given, only tasks of that type are returned;
    /// tasks popped past are re-inserted afterwards, so the queue's multiset
    /// of tasks minus the returned batch is unchanged.
    pub fn pop_next_batch(
        &mut self,
        batch_size: usize,
        task_type: Option<TaskType>,
    ) -> Vec<LlmTask> {
        let mut batch = Vec::new();
        let mut buffer = Vec::new();

        while batch.len() < batch_size {
            let Some(Reverse(QueueEntry(candidate))) = self.heap.pop() else {
                break;
            };
            match task_type {
                Some(wanted) if candidate.task_type != wanted => buffer.push(candidate),
                _ => batch.push(candidate),
            }
        }

        for task in buffer {
            self.add_task(task);
        }

        batch
    }

    /// Non-destructive snapshot grouping tasks by effective model.
    ///
    /// Each group accumulates tasks in priority order while its cumulative
    /// token estimate stays within `max_tokens`; tasks that would exceed the
    /// cap are dropped from the snapshot only.
    pub fn group_for_batching(&self, max_tokens: u32) -> HashMap<String, Vec<LlmTask>> {
        let mut grouped: HashMap<String, Vec<LlmTask>> = HashMap::new();
        let mut ordered: Vec<&LlmTask> = self.heap.iter().map(|Reverse(entry)| &entry.0).collect();
        ordered.sort_by_key(|task| task.queue_key());

        let mut group_tokens: HashMap<String, u32> = HashMap::new();
        for task in ordered {
            let key = task.effective_model().to_string();
            let current = group_tokens.get(&key).copied().unwrap_or(0);
            if current + task.token_estimate <= max_tokens {
                group_tokens.insert(key.clone(), current + task.token_estimate);
                grouped.entry(key).or_default().push(task.clone());
            }
        }

        grouped
    }
}
