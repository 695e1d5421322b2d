//! Per-resource FIFO request queue.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Debug)]
struct Lane<J> {
    pending: VecDeque<J>,
    /// A drainer owns the lane.
    running: bool,
    /// The drainer took a job and has not asked for the next one yet.
    in_flight: bool,
}

impl<J> Default for Lane<J> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            running: false,
            in_flight: false,
        }
    }
}

/// Serializes jobs per resource.
///
/// At most one job per resource runs at a time. The caller that receives
/// `true` from [`push`](Self::push) owns the lane and drains it with
/// [`next`](Self::next) until it returns `None`.
#[derive(Debug)]
pub struct FetchQueue<J> {
    lanes: Mutex<HashMap<String, Lane<J>>>,
}

impl<J> FetchQueue<J> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Appends a job. Returns true if the lane was idle and must be drained
    /// by the caller.
    pub fn push(&self, resource: &str, job: J) -> bool {
        let mut lanes = self.lanes.lock();
        let lane = lanes.entry(resource.to_string()).or_default();
        lane.pending.push_back(job);
        if lane.running {
            false
        } else {
            lane.running = true;
            true
        }
    }

    /// Takes the next job of a lane, or marks the lane idle when it is empty.
    pub fn next(&self, resource: &str) -> Option<J> {
        let mut lanes = self.lanes.lock();
        let lane = lanes.get_mut(resource)?;
        let job = lane.pending.pop_front();
        lane.in_flight = job.is_some();
        if job.is_none() {
            lane.running = false;
        }
        job
    }

    /// Releases a lane whose drainer stopped without reaching the end.
    ///
    /// The job in flight is forgotten. Returns true if jobs are still
    /// waiting; the lane then stays owned and the caller must drain it.
    pub fn release(&self, resource: &str) -> bool {
        let mut lanes = self.lanes.lock();
        let Some(lane) = lanes.get_mut(resource) else {
            return false;
        };
        lane.in_flight = false;
        lane.running = !lane.pending.is_empty();
        lane.running
    }

    /// Returns the number of jobs waiting or running for a resource.
    pub fn len(&self, resource: &str) -> usize {
        self.lanes
            .lock()
            .get(resource)
            .map_or(0, |lane| lane.pending.len() + usize::from(lane.in_flight))
    }

    /// Returns true if nothing is waiting or running for a resource.
    pub fn is_idle(&self, resource: &str) -> bool {
        self.len(resource) == 0
    }
}

impl<J> Default for FetchQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_push_owns_the_lane() {
        let queue = FetchQueue::new();
        assert!(queue.push("Posts", 1));
        assert!(!queue.push("Posts", 2));
        assert!(queue.push("Tags", 3));
    }

    #[test]
    fn drains_in_order_then_goes_idle() {
        let queue = FetchQueue::new();
        queue.push("Posts", 1);
        queue.push("Posts", 2);
        assert_eq!(queue.len("Posts"), 2);

        assert_eq!(queue.next("Posts"), Some(1));
        assert_eq!(queue.len("Posts"), 2);
        assert_eq!(queue.next("Posts"), Some(2));
        assert_eq!(queue.len("Posts"), 1);
        assert_eq!(queue.next("Posts"), None);
        assert!(queue.is_idle("Posts"));

        // idle again, so the next push owns the lane
        assert!(queue.push("Posts", 3));
    }

    #[test]
    fn release_hands_waiting_jobs_to_a_new_drainer() {
        let queue = FetchQueue::new();
        queue.push("Posts", 1);
        queue.push("Posts", 2);
        assert_eq!(queue.next("Posts"), Some(1));

        // the drainer died while running job 1
        assert!(queue.release("Posts"));
        assert_eq!(queue.len("Posts"), 1);
        assert!(!queue.push("Posts", 3));
        assert_eq!(queue.next("Posts"), Some(2));

        assert!(queue.release("Posts"));
        assert_eq!(queue.next("Posts"), Some(3));
        assert!(!queue.release("Posts"));
        assert!(queue.is_idle("Posts"));
        assert!(queue.push("Posts", 4));
    }

    #[test]
    fn unknown_lane_is_idle() {
        let queue: FetchQueue<u8> = FetchQueue::new();
        assert_eq!(queue.next("Nope"), None);
        assert!(queue.is_idle("Nope"));
    }
}
