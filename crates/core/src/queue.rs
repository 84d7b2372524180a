//! Pending render requests: admission, de-duplication and ordering.
//!
//! The queue holds every request that is either waiting or in flight (the
//! pending set). A duplicate admission is answered with the id of the existing
//! request. The one exception is a render still in flight for a document that
//! has since been replaced: its result will be discarded, so an equal request
//! made afterwards is queued under a new id.
//! The queue does no locking of its own, the scheduler wraps it in its mutex.

use crate::request::{PageRequest, Priority, RequestId, RequestKey};
use std::collections::VecDeque;

/// Outcome of [`RequestQueue::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new request was queued under a fresh id.
    Queued(RequestId),
    /// An equal request was already pending; its id is returned.
    Coalesced(RequestId),
}

impl Admission {
    #[must_use]
    pub const fn id(self) -> RequestId {
        match self {
            Admission::Queued(id) | Admission::Coalesced(id) => id,
        }
    }
}

/// The request being rendered and the document binding it was dispatched under.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    request: PageRequest,
    generation: u64,
}

/// The pending set plus the request id counter.
#[derive(Debug)]
pub struct RequestQueue {
    queued: VecDeque<PageRequest>,
    in_flight: Option<InFlight>,
    next_id: u64,
    priority_ordering: bool,
}

impl RequestQueue {
    /// Create an empty queue. With `priority_ordering` off, requests are served
    /// strictly in admission order.
    pub fn new(priority_ordering: bool) -> Self {
        Self {
            queued: VecDeque::new(),
            in_flight: None,
            next_id: 1,
            priority_ordering,
        }
    }

    /// Admit a request for `key`, or coalesce it with an equal pending one.
    ///
    /// `generation` is the current document binding. An in-flight render
    /// dispatched under an older binding will be discarded, so it does not
    /// absorb new requests.
    pub fn admit(&mut self, key: RequestKey, priority: Priority, generation: u64) -> Admission {
        if let Some(in_flight) = self
            .in_flight
            .filter(|current| current.request.key == key && current.generation == generation)
        {
            return Admission::Coalesced(in_flight.request.id);
        }

        if let Some(index) = self.queued.iter().position(|request| request.key == key) {
            let id = self.queued[index].id;
            if priority > self.queued[index].priority {
                self.raise_priority(index, priority);
            }
            return Admission::Coalesced(id);
        }

        let id = RequestId::new(self.next_id);
        self.next_id += 1;
        self.insert(PageRequest { id, key, priority });
        Admission::Queued(id)
    }

    /// Move the next queued request in flight under document `generation`.
    ///
    /// Returns `None` while another request is still in flight or when the
    /// queue is empty.
    pub fn take_next(&mut self, generation: u64) -> Option<PageRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        let request = self.queued.pop_front()?;
        self.in_flight = Some(InFlight {
            request,
            generation,
        });
        Some(request)
    }

    /// Finish the in-flight request matching `key`.
    pub fn complete(&mut self, key: &RequestKey) -> Option<PageRequest> {
        match self.in_flight {
            Some(current) if current.request.key == *key => {
                self.in_flight = None;
                Some(current.request)
            }
            _ => None,
        }
    }

    /// Forget the in-flight request without completing it.
    pub fn release_in_flight(&mut self) -> Option<PageRequest> {
        self.in_flight.take().map(|current| current.request)
    }

    /// Drop every request that has not started yet. Returns how many were dropped.
    pub fn abandon_queued(&mut self) -> usize {
        let abandoned = self.queued.len();
        self.queued.clear();
        abandoned
    }

    /// Queued plus in-flight requests.
    pub fn pending_len(&self) -> usize {
        self.queued.len() + usize::from(self.in_flight.is_some())
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queued.is_empty()
    }

    #[cfg(test)]
    fn in_flight(&self) -> Option<&PageRequest> {
        self.in_flight.as_ref().map(|current| &current.request)
    }

    #[cfg(test)]
    fn queued_len(&self) -> usize {
        self.queued.len()
    }

    #[cfg(test)]
    fn next_id(&self) -> RequestId {
        RequestId::new(self.next_id)
    }

    fn insert(&mut self, request: PageRequest) {
        if !self.priority_ordering {
            self.queued.push_back(request);
            return;
        }
        // Ahead of everything with strictly lower priority, behind equals.
        let index = self
            .queued
            .iter()
            .position(|queued| queued.priority < request.priority)
            .unwrap_or(self.queued.len());
        self.queued.insert(index, request);
    }

    fn raise_priority(&mut self, index: usize, priority: Priority) {
        if !self.priority_ordering {
            self.queued[index].priority = priority;
            return;
        }
        if let Some(mut request) = self.queued.remove(index) {
            request.priority = priority;
            self.insert(request);
        }
    }
}
