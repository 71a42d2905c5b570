//! Per-key single-flight table.
//!
//! At most one caller computes a value for a given key at a time. The first
//! caller to [`join`](FlightTable::join) a key becomes the leader and gets a
//! [`FlightGuard`]; everyone arriving while the flight is open blocks until
//! the leader completes it and then receives a clone of the result.
//!
//! ```text
//!   thread A: join(k) → Leader ──── compute ──── complete(v) ─┐
//!   thread B: join(k) → Follower ─── wait ───────────────────┴→ Some(v)
//!   thread C: join(j) → Leader (unrelated key, no waiting)
//! ```
//!
//! Flights are transient: the table entry is removed as soon as the leader
//! completes or drops its guard. A guard dropped without completing (supplier
//! error or panic) abandons the flight and followers get `None`, after which
//! they are expected to retry.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

enum State<V> {
    Running,
    Finished(V),
    Abandoned,
}

struct Flight<V> {
    state: Mutex<State<V>>,
    done: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(State::Running),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> Option<V> {
        let mut state = self.state.lock();
        while matches!(*state, State::Running) {
            self.done.wait(&mut state);
        }
        match &*state {
            State::Finished(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn settle(&self, outcome: State<V>) {
        *self.state.lock() = outcome;
        self.done.notify_all();
    }
}

/// Outcome of [`FlightTable::join`].
pub enum Joined<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// This caller owns the computation.
    Leader(FlightGuard<'a, K, V>),
    /// Another caller owned it; `None` if that caller gave up.
    Follower(Option<V>),
}

/// Table of in-flight computations keyed by cache key.
pub struct FlightTable<K, V> {
    flights: Mutex<FxHashMap<K, Arc<Flight<V>>>>,
}

impl<K, V> FlightTable<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(FxHashMap::default()),
        }
    }

    /// Joins the flight for `key`, opening one if none is in progress.
    ///
    /// Followers block until the leader settles.
    pub fn join(&self, key: &K) -> Joined<'_, K, V> {
        let mut flights = self.flights.lock();
        if let Some(flight) = flights.get(key) {
            let flight = Arc::clone(flight);
            drop(flights);
            return Joined::Follower(flight.wait());
        }

        let flight = Arc::new(Flight::new());
        flights.insert(key.clone(), Arc::clone(&flight));
        Joined::Leader(FlightGuard {
            table: self,
            key: Some(key.clone()),
            flight,
        })
    }

    /// Number of open flights.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    fn close(&self, key: &K, flight: &Arc<Flight<V>>) {
        let mut flights = self.flights.lock();
        if flights.get(key).is_some_and(|open| Arc::ptr_eq(open, flight)) {
            flights.remove(key);
        }
    }
}

impl<K, V> Default for FlightTable<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for FlightTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightTable")
            .field("in_flight", &self.flights.lock().len())
            .finish()
    }
}

/// Leader's handle on an open flight.
///
/// Must be completed with [`complete`](Self::complete); dropping it abandons
/// the flight.
pub struct FlightGuard<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    table: &'a FlightTable<K, V>,
    key: Option<K>,
    flight: Arc<Flight<V>>,
}

impl<K, V> FlightGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Publishes `value` to every follower and closes the flight.
    pub fn complete(mut self, value: V) {
        if let Some(key) = self.key.take() {
            self.table.close(&key, &self.flight);
        }
        self.flight.settle(State::Finished(value));
    }
}

impl<K, V> Drop for FlightGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.table.close(&key, &self.flight);
            self.flight.settle(State::Abandoned);
        }
    }
}
