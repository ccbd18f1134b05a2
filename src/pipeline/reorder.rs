//! Sequence-ordered release of rows at the writer.
//!
//! Rows arrive grouped by nothing in particular: workers race. The buffer
//! holds rows per line until every earlier line reported completion, then
//! releases them in line order. At most `window` lines are held; beyond
//! that the lowest buffered line is released early and an [`OrderGap`] is
//! returned so the caller can report it.

use std::collections::BTreeMap;

use crate::types::OutputRow;

/// Lines skipped over when the window overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderGap {
    /// First line that had not been released yet.
    pub expected: u64,
    /// Line released early.
    pub resumed_at: u64,
}

#[derive(Debug, Default)]
struct PendingLine {
    rows: Vec<OutputRow>,
    complete: bool,
}

#[derive(Debug)]
pub struct ReorderBuffer {
    next: u64,
    window: usize,
    pending: BTreeMap<u64, PendingLine>,
}

impl ReorderBuffer {
    pub fn new(window: usize) -> Self {
        Self {
            next: 0,
            window: window.max(1),
            pending: BTreeMap::new(),
        }
    }

    /// Next line number due for release.
    pub fn next_expected(&self) -> u64 {
        self.next
    }

    /// Accept a row; rows of lines already released pass straight through.
    pub fn push_row(&mut self, row: OutputRow, ready: &mut Vec<OutputRow>) -> Option<OrderGap> {
        if row.sequence < self.next {
            ready.push(row);
            return None;
        }
        self.pending.entry(row.sequence).or_default().rows.push(row);
        self.enforce_window(ready)
    }

    /// Mark a line as fully forwarded and release whatever became due.
    pub fn complete(&mut self, sequence: u64, ready: &mut Vec<OutputRow>) -> Option<OrderGap> {
        if sequence < self.next {
            return None;
        }
        self.pending.entry(sequence).or_default().complete = true;
        self.release(ready);
        self.enforce_window(ready)
    }

    /// Release everything still held, in line order.
    pub fn finish(self, ready: &mut Vec<OutputRow>) {
        for (_, line) in self.pending {
            ready.extend(line.rows);
        }
    }

    fn release(&mut self, ready: &mut Vec<OutputRow>) {
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() != self.next || !entry.get().complete {
                break;
            }
            ready.extend(entry.remove().rows);
            self.next += 1;
        }
    }

    fn enforce_window(&mut self, ready: &mut Vec<OutputRow>) -> Option<OrderGap> {
        if self.pending.len() <= self.window {
            return None;
        }
        let (sequence, line) = self.pending.pop_first()?;
        let gap = OrderGap {
            expected: self.next,
            resumed_at: sequence,
        };
        ready.extend(line.rows);
        self.next = sequence + 1;
        self.release(ready);
        Some(gap)
    }
}
