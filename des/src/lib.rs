//! Minimal discrete-event scheduler shared by the simulation crates.
//!
//! Models define an event type `T` and a stats type `S`, implement
//! [`Agent`] for their actors, and drive them with an [`EventLoop`].
//! Every event is broadcast to every agent; agents answer with a
//! [`Response`] holding follow-up events and newly spawned agents.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub mod parallel;

struct Scheduled<T> {
    t: usize,
    seq: usize,
    data: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.t == other.t && self.seq == other.seq
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> Ord for Scheduled<T> {
    // Reversed so the max-heap pops the earliest (t, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .t
            .cmp(&self.t)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What an agent hands back after reacting to an event
pub struct Response<T, S> {
    pub events: Vec<(usize, T)>,
    pub agents: Vec<Box<dyn Agent<T, S>>>,
}

impl<T, S> Response<T, S> {
    pub fn new() -> Self {
        Response {
            events: Vec::new(),
            agents: Vec::new(),
        }
    }

    /// Schedule a single follow-up event
    pub fn event(t: usize, data: T) -> Self {
        Response {
            events: vec![(t, data)],
            agents: Vec::new(),
        }
    }

    pub fn events(events: Vec<(usize, T)>) -> Self {
        Response {
            events,
            agents: Vec::new(),
        }
    }
}

impl<T, S> Default for Response<T, S> {
    fn default() -> Self {
        Response::new()
    }
}

/// An actor in the simulation
pub trait Agent<T, S> {
    fn act(&mut self, _current_t: usize, _data: &T) -> Response<T, S> {
        Response::new()
    }

    /// Snapshot of the agent's observable state
    fn stats(&self) -> S;
}

pub struct EventLoop<T, S> {
    queue: BinaryHeap<Scheduled<T>>,
    next_seq: usize,
    current_t: usize,
    agents: Vec<Box<dyn Agent<T, S>>>,
}

impl<T, S> EventLoop<T, S> {
    pub fn new(events: Vec<(usize, T)>, agents: Vec<Box<dyn Agent<T, S>>>) -> Self {
        let mut event_loop = EventLoop {
            queue: BinaryHeap::new(),
            next_seq: 0,
            current_t: 0,
            agents,
        };
        for (t, data) in events {
            event_loop.schedule(t, data);
        }
        event_loop
    }

    fn schedule(&mut self, t: usize, data: T) {
        self.queue.push(Scheduled {
            t,
            seq: self.next_seq,
            data,
        });
        self.next_seq += 1;
    }

    fn broadcast(&mut self, event: Scheduled<T>) {
        self.current_t = event.t;
        let mut spawned = Vec::new();
        let mut follow_ups = Vec::new();

        for agent in &mut self.agents {
            let response = agent.act(self.current_t, &event.data);
            // Events in the past can never be delivered
            follow_ups.extend(
                response
                    .events
                    .into_iter()
                    .filter(|(t, _)| *t >= event.t),
            );
            spawned.extend(response.agents);
        }

        for (t, data) in follow_ups {
            self.schedule(t, data);
        }
        self.agents.extend(spawned);
    }

    /// Process events in time order until the queue is empty or the next
    /// event lies beyond `until`
    pub fn run(&mut self, until: usize) {
        while self.queue.peek().is_some_and(|next| next.t <= until) {
            if let Some(event) = self.queue.pop() {
                self.broadcast(event);
            }
        }
    }

    pub fn current_t(&self) -> usize {
        self.current_t
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// One stats snapshot per agent, in insertion order
    pub fn stats(&self) -> Vec<S> {
        self.agents.iter().map(|agent| agent.stats()).collect()
    }
}
