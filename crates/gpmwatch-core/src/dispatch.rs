//! Per-tick event selection.
//!
//! Each tick emits at most one event. A pending click always wins; the
//! position is then not read at all, so a move that happened alongside the
//! click is compared against the unchanged baseline on the next tick.

use crate::click::ClickReport;
use crate::event::Event;
use crate::position::Position;

/// Tracks the last emitted position and picks what to emit each tick.
#[derive(Debug, Default)]
pub struct Dispatcher {
    last: Option<Position>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last position that was emitted.
    pub fn last(&self) -> Option<Position> {
        self.last
    }

    /// Run one tick.
    ///
    /// `read_position` is only called when no click is pending. A `None`
    /// read (slot mid-write) leaves the baseline untouched.
    pub fn tick<F>(&mut self, pending: Option<ClickReport>, read_position: F) -> Option<Event>
    where
        F: FnOnce() -> Option<Position>,
    {
        if let Some(click) = pending {
            return Some(Event::Click(click));
        }

        let pos = read_position()?;
        if self.last == Some(pos) {
            return None;
        }
        self.last = Some(pos);
        Some(Event::Position(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::click::{Button, Multiplicity};

    fn left_click(position: Option<Position>) -> ClickReport {
        ClickReport {
            multiplicity: Multiplicity::Single,
            button: Button::Left,
            position,
        }
    }

    #[test]
    fn test_first_position_is_emitted() {
        let mut dispatcher = Dispatcher::new();
        let event = dispatcher.tick(None, || Some(Position::new(1, 2)));
        assert_eq!(event, Some(Event::Position(Position::new(1, 2))));
        assert_eq!(dispatcher.last(), Some(Position::new(1, 2)));
    }

    #[test]
    fn test_identical_position_not_repeated() {
        let mut dispatcher = Dispatcher::new();
        assert!(dispatcher.tick(None, || Some(Position::new(3, 3))).is_some());
        assert_eq!(dispatcher.tick(None, || Some(Position::new(3, 3))), None);
    }

    #[test]
    fn test_click_wins_and_position_carries_forward() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.tick(None, || Some(Position::new(0, 0)));

        let click = left_click(Some(Position::new(9, 9)));
        let mut read = false;
        let event = dispatcher.tick(Some(click), || {
            read = true;
            Some(Position::new(9, 9))
        });

        assert_eq!(event, Some(Event::Click(click)));
        assert!(!read, "position must not be read on a click tick");
        assert_eq!(dispatcher.last(), Some(Position::new(0, 0)));

        // The move is picked up on the next tick.
        assert_eq!(
            dispatcher.tick(None, || Some(Position::new(9, 9))),
            Some(Event::Position(Position::new(9, 9)))
        );
    }

    #[test]
    fn test_ambiguous_read_keeps_baseline() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.tick(None, || Some(Position::new(4, 4)));

        assert_eq!(dispatcher.tick(None, || None), None);
        assert_eq!(dispatcher.last(), Some(Position::new(4, 4)));

        // Same position after the torn read is still a duplicate.
        assert_eq!(dispatcher.tick(None, || Some(Position::new(4, 4))), None);
    }

    #[test]
    fn test_clicks_are_never_coalesced() {
        let mut dispatcher = Dispatcher::new();
        let first = left_click(None);
        let second = left_click(Some(Position::new(1, 1)));

        assert_eq!(dispatcher.tick(Some(first), || None), Some(Event::Click(first)));
        assert_eq!(
            dispatcher.tick(Some(second), || None),
            Some(Event::Click(second))
        );
    }
}
