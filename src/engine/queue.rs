use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::AppError;

/// FIFO of ride ids awaiting assignment. Entries are served oldest-first;
/// nothing reorders on priority, fare, or distance.
pub struct RideQueue {
    entries: Mutex<VecDeque<i64>>,
}

impl Default for RideQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RideQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the 1-based position at time of insertion.
    pub fn enqueue(&self, ride_id: i64) -> Result<usize, AppError> {
        let mut entries = self.entries.lock().expect("ride queue lock poisoned");

        if entries.contains(&ride_id) {
            return Err(AppError::Conflict(format!(
                "ride {ride_id} is already queued"
            )));
        }

        entries.push_back(ride_id);
        Ok(entries.len())
    }

    pub fn peek_head(&self) -> Option<i64> {
        self.entries
            .lock()
            .expect("ride queue lock poisoned")
            .front()
            .copied()
    }

    /// Removes a specific ride, used after a successful match.
    pub fn dequeue(&self, ride_id: i64) -> Result<(), AppError> {
        let mut entries = self.entries.lock().expect("ride queue lock poisoned");

        match entries.iter().position(|id| *id == ride_id) {
            Some(index) => {
                entries.remove(index);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("ride {ride_id} is not queued"))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("ride queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::RideQueue;
    use crate::error::AppError;

    #[test]
    fn positions_are_one_based_insertion_order() {
        let queue = RideQueue::new();
        assert_eq!(queue.enqueue(10).unwrap(), 1);
        assert_eq!(queue.enqueue(20).unwrap(), 2);
        assert_eq!(queue.enqueue(30).unwrap(), 3);
        assert_eq!(queue.peek_head(), Some(10));
    }

    #[test]
    fn duplicate_enqueue_conflicts() {
        let queue = RideQueue::new();
        queue.enqueue(10).unwrap();
        assert!(matches!(queue.enqueue(10), Err(AppError::Conflict(_))));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn dequeue_removes_a_specific_ride() {
        let queue = RideQueue::new();
        queue.enqueue(10).unwrap();
        queue.enqueue(20).unwrap();
        queue.enqueue(30).unwrap();

        queue.dequeue(20).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek_head(), Some(10));

        queue.dequeue(10).unwrap();
        assert_eq!(queue.peek_head(), Some(30));
    }

    #[test]
    fn dequeue_missing_ride_is_not_found() {
        let queue = RideQueue::new();
        assert!(matches!(queue.dequeue(99), Err(AppError::NotFound(_))));
    }

    #[test]
    fn head_survives_until_dequeued() {
        let queue = RideQueue::new();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();

        // Removing a later entry never reorders the head.
        queue.dequeue(2).unwrap();
        assert_eq!(queue.peek_head(), Some(1));
    }
}
