//! Bounded undo history
//!
//! Each step is the tree as it was before an operation. Trees are shared
//! snapshots, so a step costs one `Arc` and nothing is copied.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::models::Tree;

/// Previous trees, newest last
#[derive(Debug)]
pub struct UndoLog {
    steps: VecDeque<Arc<Tree>>,
    limit: usize,
}

impl UndoLog {
    pub fn new(limit: usize) -> Self {
        Self {
            steps: VecDeque::new(),
            limit,
        }
    }

    /// Remember `tree`; the oldest step falls off past the limit
    pub fn push(&mut self, tree: Arc<Tree>) {
        if self.limit == 0 {
            return;
        }
        self.steps.push_back(tree);
        while self.steps.len() > self.limit {
            self.steps.pop_front();
        }
    }

    /// The most recent step
    pub fn pop(&mut self) -> Option<Arc<Tree>> {
        self.steps.pop_back()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        let mut log = UndoLog::new(2);
        let trees: Vec<_> = (0..3).map(|i| Arc::new(Tree::new(format!("t{}", i)))).collect();
        for tree in &trees {
            log.push(Arc::clone(tree));
        }
        assert_eq!(log.len(), 2);
        assert!(Arc::ptr_eq(&log.pop().unwrap(), &trees[2]));
        assert!(Arc::ptr_eq(&log.pop().unwrap(), &trees[1]));
        assert!(log.pop().is_none());
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut log = UndoLog::new(0);
        log.push(Arc::new(Tree::new("t")));
        assert!(log.is_empty());
    }
}
