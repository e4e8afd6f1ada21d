//! Overlap volumes with per-tick edge detection.
//!
//! Each tick the instance reports every body overlapping the trigger's
//! sensor through [`Trigger::entity_inside`], then calls
//! [`Trigger::update`], which diffs this tick's set against the previous
//! tick's and emits:
//!
//! 1. `Enter` for each newcomer (at most once ever if `one_time`),
//! 2. `Exit` for each entity that left,
//! 3. `Stay` for each entity present now,
//! 4. `Empty` once when the set drains.

use std::collections::BTreeSet;

use crate::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEdge {
    Enter,
    Exit,
    Stay,
    Empty,
    Reset,
}

/// One edge event. `entity` is `None` for `Empty` and `Reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub trigger: EntityId,
    pub edge: TriggerEdge,
    pub entity: Option<EntityId>,
}

#[derive(Debug, Clone)]
pub struct Trigger {
    id: EntityId,
    one_time: bool,
    triggered: bool,
    in_trigger: BTreeSet<EntityId>,
    last_in_trigger: BTreeSet<EntityId>,
}

impl Trigger {
    pub fn new(id: EntityId, one_time: bool) -> Self {
        Self {
            id,
            one_time,
            triggered: false,
            in_trigger: BTreeSet::new(),
            last_in_trigger: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn is_one_time(&self) -> bool {
        self.one_time
    }

    /// `true` once a one-time trigger has fired its single `Enter`.
    pub fn triggered(&self) -> bool {
        self.triggered
    }

    /// Entities accumulated for the tick in progress.
    pub fn in_trigger(&self) -> &BTreeSet<EntityId> {
        &self.in_trigger
    }

    /// Entities that were inside during the last completed tick.
    pub fn last_in_trigger(&self) -> &BTreeSet<EntityId> {
        &self.last_in_trigger
    }

    /// Records one overlap for this tick. Repeats and the trigger itself
    /// are ignored.
    pub fn entity_inside(&mut self, entity: EntityId) {
        if entity != self.id {
            self.in_trigger.insert(entity);
        }
    }

    /// Closes the tick: emits edge events into `events`, then rotates the
    /// current set into the previous one.
    pub fn update(&mut self, events: &mut Vec<TriggerEvent>) {
        for &entity in self.in_trigger.difference(&self.last_in_trigger) {
            if self.one_time && self.triggered {
                continue;
            }
            self.triggered = true;
            events.push(self.event(TriggerEdge::Enter, Some(entity)));
        }
        for &entity in self.last_in_trigger.difference(&self.in_trigger) {
            events.push(self.event(TriggerEdge::Exit, Some(entity)));
        }
        for &entity in &self.in_trigger {
            events.push(self.event(TriggerEdge::Stay, Some(entity)));
        }
        if self.in_trigger.is_empty() && !self.last_in_trigger.is_empty() {
            events.push(self.event(TriggerEdge::Empty, None));
        }

        self.last_in_trigger = std::mem::take(&mut self.in_trigger);
    }

    /// Clears membership and the one-time latch. The body stays put.
    pub fn reset(&mut self, events: &mut Vec<TriggerEvent>) {
        self.in_trigger.clear();
        self.last_in_trigger.clear();
        self.triggered = false;
        events.push(self.event(TriggerEdge::Reset, None));
    }

    /// Drops a removed entity from both sets without an `Exit`.
    pub(crate) fn forget(&mut self, entity: EntityId) {
        self.in_trigger.remove(&entity);
        self.last_in_trigger.remove(&entity);
    }

    fn event(&self, edge: TriggerEdge, entity: Option<EntityId>) -> TriggerEvent {
        TriggerEvent {
            trigger: self.id,
            edge,
            entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIGGER: EntityId = EntityId(0);
    const A: EntityId = EntityId(1);
    const B: EntityId = EntityId(2);

    fn count(events: &[TriggerEvent], edge: TriggerEdge) -> usize {
        events.iter().filter(|e| e.edge == edge).count()
    }

    fn tick(trigger: &mut Trigger, inside: &[EntityId]) -> Vec<TriggerEvent> {
        for &e in inside {
            trigger.entity_inside(e);
        }
        let mut events = Vec::new();
        trigger.update(&mut events);
        events
    }

    #[test]
    fn test_update_enter_stay_exit_empty_sequence() {
        let mut t = Trigger::new(TRIGGER, false);

        let first = tick(&mut t, &[A]);
        assert_eq!(
            first,
            vec![
                t.event(TriggerEdge::Enter, Some(A)),
                t.event(TriggerEdge::Stay, Some(A)),
            ]
        );

        let second = tick(&mut t, &[A]);
        assert_eq!(second, vec![t.event(TriggerEdge::Stay, Some(A))]);

        let third = tick(&mut t, &[]);
        assert_eq!(
            third,
            vec![
                t.event(TriggerEdge::Exit, Some(A)),
                t.event(TriggerEdge::Empty, None),
            ]
        );

        assert!(tick(&mut t, &[]).is_empty());
    }

    #[test]
    fn test_entity_inside_duplicates_and_self_are_ignored() {
        let mut t = Trigger::new(TRIGGER, false);
        t.entity_inside(A);
        t.entity_inside(A);
        t.entity_inside(TRIGGER);

        assert_eq!(t.in_trigger().len(), 1);
        let mut events = Vec::new();
        t.update(&mut events);
        assert_eq!(count(&events, TriggerEdge::Stay), 1);
        assert!(!t.last_in_trigger().contains(&TRIGGER));
    }

    #[test]
    fn test_update_one_time_enters_at_most_once() {
        let mut t = Trigger::new(TRIGGER, true);
        let mut enters = 0;
        let ticks: [&[EntityId]; 6] = [&[A, B], &[], &[B], &[A], &[], &[A, B]];
        for inside in ticks {
            enters += count(&tick(&mut t, inside), TriggerEdge::Enter);
        }
        assert_eq!(enters, 1);
        assert!(t.triggered());
    }

    #[test]
    fn test_update_stay_count_equals_current_set_size() {
        let mut t = Trigger::new(TRIGGER, false);
        let ticks: [&[EntityId]; 4] = [&[A], &[A, B], &[B], &[]];
        for inside in ticks {
            let events = tick(&mut t, inside);
            assert_eq!(count(&events, TriggerEdge::Stay), inside.len());
        }
    }

    #[test]
    fn test_update_empty_fires_once_per_drain() {
        let mut t = Trigger::new(TRIGGER, false);
        tick(&mut t, &[A, B]);
        let drained = tick(&mut t, &[]);
        assert_eq!(count(&drained, TriggerEdge::Empty), 1);
        assert_eq!(count(&drained, TriggerEdge::Exit), 2);
        assert_eq!(count(&tick(&mut t, &[]), TriggerEdge::Empty), 0);
    }

    #[test]
    fn test_reset_clears_latch_and_notifies() {
        let mut t = Trigger::new(TRIGGER, true);
        tick(&mut t, &[A]);
        assert!(t.triggered());

        let mut events = Vec::new();
        t.reset(&mut events);

        assert_eq!(events, vec![t.event(TriggerEdge::Reset, None)]);
        assert!(!t.triggered());
        assert!(t.last_in_trigger().is_empty());
        // The latch is open again.
        assert_eq!(count(&tick(&mut t, &[A]), TriggerEdge::Enter), 1);
    }
}
