//! Fixed-size handler tables indexed by command id.
//!
//! The command-id space is a dense enumeration shared by both binaries at
//! build time, so handlers live in two parallel arrays of that length
//! rather than in a name-keyed map: one array of ordered multicast lists
//! for commands, one array of single slots for queries.
//!
//! Registration happens during application setup; during steady-state
//! dispatch the table is read-only, so no lock guards handler invocation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::codec::ValueView;
use crate::protocol::MAX_COMMAND_CAPACITY;

/// Handler for a fire-and-forget command.
pub type CommandHandler = Box<dyn Fn(&ValueView) + Send>;

/// Handler for a query; must produce exactly one string result.
pub type QueryHandler = Box<dyn Fn(&ValueView) -> String + Send>;

/// Two parallel handler arrays of length `command_count`.
pub struct HandlerTable {
    commands: Vec<Vec<CommandHandler>>,
    queries: Vec<Option<QueryHandler>>,
}

impl HandlerTable {
    /// Create empty tables for `command_count` dense ids.
    ///
    /// # Panics
    ///
    /// Panics if `command_count` collides with the reserved id range.
    pub fn new(command_count: u16) -> Self {
        assert!(
            command_count <= MAX_COMMAND_CAPACITY,
            "command count {} collides with reserved ids",
            command_count
        );
        Self {
            commands: (0..command_count).map(|_| Vec::new()).collect(),
            queries: (0..command_count).map(|_| None).collect(),
        }
    }

    /// Number of dense command ids the table covers.
    #[inline]
    pub fn command_count(&self) -> u16 {
        self.commands.len() as u16
    }

    /// Register a command handler. Additive: repeated registration for
    /// the same id accumulates, and handlers run in registration order.
    ///
    /// # Panics
    ///
    /// Panics if `command_id` is out of range - the two binaries were
    /// built against different protocol definitions.
    pub fn add_command(&mut self, command_id: u16, handler: impl Fn(&ValueView) + Send + 'static) {
        let slot = self
            .commands
            .get_mut(command_id as usize)
            .unwrap_or_else(|| panic!("command id {} out of range", command_id));
        slot.push(Box::new(handler));
    }

    /// Register a query handler. Single-slot, first registration wins; a
    /// conflicting registration is dropped with a warning, since only one
    /// result string can be returned per query.
    ///
    /// # Panics
    ///
    /// Panics if `command_id` is out of range.
    pub fn set_query(
        &mut self,
        command_id: u16,
        handler: impl Fn(&ValueView) -> String + Send + 'static,
    ) {
        let slot = self
            .queries
            .get_mut(command_id as usize)
            .unwrap_or_else(|| panic!("query id {} out of range", command_id));
        if slot.is_some() {
            tracing::warn!(command_id, "query handler already registered, keeping first");
            return;
        }
        *slot = Some(Box::new(handler));
    }

    /// Invoke every handler registered for a command, in order.
    ///
    /// An id beyond the table (a newer peer's command) is dropped with a
    /// debug log; an in-range id with no handlers is a silent no-op. A
    /// panicking handler is caught and logged, and the remaining handlers
    /// still run.
    pub fn run_commands(&self, command_id: u16, value: &ValueView) {
        let Some(handlers) = self.commands.get(command_id as usize) else {
            tracing::debug!(command_id, "dropping command outside local table");
            return;
        };
        for handler in handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(value))) {
                tracing::error!(command_id, ?panic, "command handler panicked");
            }
        }
    }

    /// Invoke the query handler for an id and return its result.
    ///
    /// Returns the empty string when the id is unhandled, out of range,
    /// or the handler panics - an unanswered query is not an error.
    pub fn run_query(&self, command_id: u16, value: &ValueView) -> String {
        let handler = match self.queries.get(command_id as usize) {
            Some(Some(handler)) => handler,
            Some(None) => return String::new(),
            None => {
                tracing::debug!(command_id, "dropping query outside local table");
                return String::new();
            }
        };
        match catch_unwind(AssertUnwindSafe(|| handler(value))) {
            Ok(result) => result,
            Err(panic) => {
                tracing::error!(command_id, ?panic, "query handler panicked");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Value;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn view(value: &Value) -> ValueView {
        ValueView::from_value(value)
    }

    #[test]
    fn test_command_multicast_in_registration_order() {
        let mut table = HandlerTable::new(8);
        let log = Arc::new(std::sync::Mutex::new(String::new()));

        let log_a = log.clone();
        table.add_command(3, move |_| log_a.lock().unwrap().push('a'));
        let log_b = log.clone();
        table.add_command(3, move |_| log_b.lock().unwrap().push('b'));

        table.run_commands(3, &view(&Value::None));
        assert_eq!(*log.lock().unwrap(), "ab");
    }

    #[test]
    fn test_unregistered_command_is_noop() {
        let table = HandlerTable::new(8);
        table.run_commands(5, &view(&Value::Int(1)));
    }

    #[test]
    fn test_command_beyond_table_dropped() {
        let table = HandlerTable::new(4);
        // Does not panic; the peer simply speaks a newer protocol.
        table.run_commands(100, &view(&Value::None));
    }

    #[test]
    fn test_query_first_registration_wins() {
        let mut table = HandlerTable::new(8);
        table.set_query(2, |_| "first".to_string());
        table.set_query(2, |_| "second".to_string());

        assert_eq!(table.run_query(2, &view(&Value::None)), "first");
    }

    #[test]
    fn test_query_without_handler_resolves_empty() {
        let table = HandlerTable::new(8);
        assert_eq!(table.run_query(2, &view(&Value::None)), "");
        assert_eq!(table.run_query(99, &view(&Value::None)), "");
    }

    #[test]
    fn test_query_receives_value() {
        let mut table = HandlerTable::new(8);
        table.set_query(1, |v| v.as_int().unwrap_or(0).to_string());
        assert_eq!(table.run_query(1, &view(&Value::Int(42))), "42");
    }

    #[test]
    fn test_panicking_command_handler_does_not_stop_others() {
        let mut table = HandlerTable::new(4);
        let hits = Arc::new(AtomicU32::new(0));

        table.add_command(0, |_| panic!("boom"));
        let hits_clone = hits.clone();
        table.add_command(0, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        table.run_commands(0, &view(&Value::None));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_query_handler_resolves_empty() {
        let mut table = HandlerTable::new(4);
        table.set_query(0, |_| panic!("boom"));
        assert_eq!(table.run_query(0, &view(&Value::None)), "");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_registration_panics() {
        let mut table = HandlerTable::new(4);
        table.add_command(4, |_| {});
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn test_capacity_cannot_cover_reserved_ids() {
        let _ = HandlerTable::new(u16::MAX);
    }
}
