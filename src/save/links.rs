//! Correlation buffers for links whose two halves appear in either order

use std::collections::HashMap;

/// Which end of a superhighway a gate sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateSide {
    Entry,
    Exit,
}

impl GateSide {
    pub fn from_class(class: &str) -> Option<Self> {
        match class {
            "highwayentrygate" => Some(GateSide::Entry),
            "highwayexitgate" => Some(GateSide::Exit),
            _ => None,
        }
    }
}

/// A superhighway row, complete once both sectors are known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superhighway {
    pub id: i64,
    pub macro_name: String,
    pub entry_gate: i64,
    pub sector_from: String,
    pub exit_gate: i64,
    pub sector_to: String,
}

impl Superhighway {
    pub fn is_ready(&self) -> bool {
        !self.sector_from.is_empty() && !self.sector_to.is_empty()
    }
}

/// Joins superhighways to the sectors of their entry and exit gates.
///
/// A highway names its gates by connection id; each gate names the highway
/// connection it is attached to. Whichever comes first waits here.
#[derive(Debug, Default)]
pub struct HighwayLinker {
    highways: Vec<Superhighway>,
    gates: HashMap<(GateSide, i64), String>,
}

impl HighwayLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a superhighway; returns it when both gates were already seen
    pub fn add_highway(
        &mut self,
        id: i64,
        macro_name: &str,
        entry_gate: i64,
        exit_gate: i64,
    ) -> Option<Superhighway> {
        if id <= 0 || entry_gate <= 0 || exit_gate <= 0 {
            return None;
        }

        let highway = Superhighway {
            id,
            macro_name: macro_name.to_string(),
            entry_gate,
            sector_from: self
                .gates
                .remove(&(GateSide::Entry, entry_gate))
                .unwrap_or_default(),
            exit_gate,
            sector_to: self
                .gates
                .remove(&(GateSide::Exit, exit_gate))
                .unwrap_or_default(),
        };

        if highway.is_ready() {
            return Some(highway);
        }
        self.highways.push(highway);
        None
    }

    /// Register a gate attached to highway connection `connected`; returns
    /// the highway it completes, if any
    pub fn add_gate(&mut self, side: GateSide, connected: i64, sector: &str) -> Option<Superhighway> {
        if connected <= 0 {
            return None;
        }

        let position = self.highways.iter().position(|h| match side {
            GateSide::Entry => h.entry_gate == connected,
            GateSide::Exit => h.exit_gate == connected,
        });
        let Some(position) = position else {
            self.gates.insert((side, connected), sector.to_string());
            return None;
        };

        let highway = &mut self.highways[position];
        match side {
            GateSide::Entry => highway.sector_from = sector.to_string(),
            GateSide::Exit => highway.sector_to = sector.to_string(),
        }
        if highway.is_ready() {
            Some(self.highways.swap_remove(position))
        } else {
            None
        }
    }

    /// Highways still missing a sector
    pub fn pending_highways(&self) -> usize {
        self.highways.len()
    }

    /// Gates whose highway never showed up
    pub fn pending_gates(&self) -> usize {
        self.gates.len()
    }
}

/// A commander to subordinate link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubordinateLink {
    pub commander_id: i64,
    pub subordinate_id: i64,
    pub assignment: String,
}

/// Joins commanders and subordinates.
///
/// The commander exposes a `subordinates` connection; each subordinate's
/// `commander` connection points at that connection id. The assignment is
/// the name of the commander's group whose index the subordinate carries.
#[derive(Debug, Default)]
pub struct SubordinateLinker {
    /// (commander, group index) -> assignment
    groups: HashMap<(i64, i64), String>,
    /// subordinate -> group index
    member_groups: HashMap<i64, i64>,
    /// subordinates connection id -> commander
    commanders: HashMap<i64, i64>,
    /// commander connection id -> subordinates waiting for the commander
    waiting: HashMap<i64, Vec<i64>>,
    /// (commander, subordinate) pairs waiting for their assignment
    matched: Vec<(i64, i64)>,
}

impl SubordinateLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `subordinates/group` entry of a commander
    pub fn add_group(&mut self, commander: i64, index: i64, assignment: &str) -> Vec<SubordinateLink> {
        if commander <= 0 || index <= 0 {
            return Vec::new();
        }
        self.groups
            .insert((commander, index), assignment.to_string());
        self.drain_ready()
    }

    /// The group index a subordinate belongs to
    pub fn add_member_group(&mut self, subordinate: i64, index: i64) -> Vec<SubordinateLink> {
        if subordinate <= 0 || index <= 0 {
            return Vec::new();
        }
        self.member_groups.insert(subordinate, index);
        self.drain_ready()
    }

    /// The commander side: its `subordinates` connection id
    pub fn add_commander(&mut self, commander: i64, connection: i64) -> Vec<SubordinateLink> {
        if commander <= 0 || connection <= 0 {
            return Vec::new();
        }
        self.commanders.insert(connection, commander);
        if let Some(subordinates) = self.waiting.remove(&connection) {
            self.matched
                .extend(subordinates.into_iter().map(|s| (commander, s)));
        }
        self.drain_ready()
    }

    /// The subordinate side: the commander connection it is connected to
    pub fn add_subordinate(&mut self, subordinate: i64, connection: i64) -> Vec<SubordinateLink> {
        if subordinate <= 0 || connection <= 0 {
            return Vec::new();
        }
        match self.commanders.get(&connection) {
            Some(&commander) => self.matched.push((commander, subordinate)),
            None => self.waiting.entry(connection).or_default().push(subordinate),
        }
        self.drain_ready()
    }

    fn assignment(&self, commander: i64, subordinate: i64) -> Option<&str> {
        let index = self.member_groups.get(&subordinate)?;
        self.groups.get(&(commander, *index)).map(|s| s.as_str())
    }

    fn drain_ready(&mut self) -> Vec<SubordinateLink> {
        let mut ready = Vec::new();
        let mut still_matched = Vec::new();

        for (commander, subordinate) in std::mem::take(&mut self.matched) {
            match self.assignment(commander, subordinate) {
                Some(assignment) => ready.push(SubordinateLink {
                    commander_id: commander,
                    subordinate_id: subordinate,
                    assignment: assignment.to_string(),
                }),
                None => still_matched.push((commander, subordinate)),
            }
        }

        self.matched = still_matched;
        ready
    }

    /// Subordinate halves that never got their commander or assignment
    pub fn pending(&self) -> usize {
        self.waiting.values().map(Vec::len).sum::<usize>() + self.matched.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_highway() -> Superhighway {
        Superhighway {
            id: 100,
            macro_name: "highway_macro".to_string(),
            entry_gate: 11,
            sector_from: "sector_a".to_string(),
            exit_gate: 12,
            sector_to: "sector_b".to_string(),
        }
    }

    #[test]
    fn test_highway_before_gates() {
        let mut linker = HighwayLinker::new();
        assert_eq!(linker.add_highway(100, "highway_macro", 11, 12), None);
        assert_eq!(linker.add_gate(GateSide::Exit, 12, "sector_b"), None);
        assert_eq!(
            linker.add_gate(GateSide::Entry, 11, "sector_a"),
            Some(expected_highway())
        );
        assert_eq!(linker.pending_highways(), 0);
        assert_eq!(linker.pending_gates(), 0);
    }

    #[test]
    fn test_gates_before_highway() {
        let mut linker = HighwayLinker::new();
        assert_eq!(linker.add_gate(GateSide::Entry, 11, "sector_a"), None);
        assert_eq!(linker.add_gate(GateSide::Exit, 12, "sector_b"), None);
        assert_eq!(
            linker.add_highway(100, "highway_macro", 11, 12),
            Some(expected_highway())
        );
        assert_eq!(linker.pending_gates(), 0);
    }

    #[test]
    fn test_highway_between_gates() {
        let mut linker = HighwayLinker::new();
        assert_eq!(linker.add_gate(GateSide::Entry, 11, "sector_a"), None);
        assert_eq!(linker.add_highway(100, "highway_macro", 11, 12), None);
        assert_eq!(
            linker.add_gate(GateSide::Exit, 12, "sector_b"),
            Some(expected_highway())
        );
    }

    #[test]
    fn test_gate_side_must_match() {
        let mut linker = HighwayLinker::new();
        assert_eq!(linker.add_gate(GateSide::Exit, 11, "sector_a"), None);
        assert_eq!(linker.add_highway(100, "highway_macro", 11, 12), None);
        assert_eq!(linker.pending_highways(), 1);
        assert_eq!(linker.pending_gates(), 1);
    }

    #[test]
    fn test_incomplete_highway_is_ignored() {
        let mut linker = HighwayLinker::new();
        assert_eq!(linker.add_highway(100, "highway_macro", 0, 12), None);
        assert_eq!(linker.pending_highways(), 0);
    }

    fn link() -> SubordinateLink {
        SubordinateLink {
            commander_id: 1,
            subordinate_id: 2,
            assignment: "trade".to_string(),
        }
    }

    #[test]
    fn test_commander_first() {
        let mut linker = SubordinateLinker::new();
        assert!(linker.add_group(1, 1, "trade").is_empty());
        assert!(linker.add_commander(1, 50).is_empty());
        assert!(linker.add_member_group(2, 1).is_empty());
        assert_eq!(linker.add_subordinate(2, 50), vec![link()]);
        assert_eq!(linker.pending(), 0);
    }

    #[test]
    fn test_subordinate_first() {
        let mut linker = SubordinateLinker::new();
        assert!(linker.add_member_group(2, 1).is_empty());
        assert!(linker.add_subordinate(2, 50).is_empty());
        assert_eq!(linker.pending(), 1);
        assert!(linker.add_group(1, 1, "trade").is_empty());
        assert_eq!(linker.add_commander(1, 50), vec![link()]);
        assert_eq!(linker.pending(), 0);
    }

    #[test]
    fn test_assignment_arrives_last() {
        let mut linker = SubordinateLinker::new();
        assert!(linker.add_commander(1, 50).is_empty());
        assert!(linker.add_subordinate(2, 50).is_empty());
        assert!(linker.add_member_group(2, 1).is_empty());
        assert_eq!(linker.pending(), 1);
        assert_eq!(linker.add_group(1, 1, "trade"), vec![link()]);
    }

    #[test]
    fn test_one_commander_many_subordinates() {
        let mut linker = SubordinateLinker::new();
        linker.add_member_group(2, 1);
        linker.add_member_group(3, 2);
        linker.add_subordinate(2, 50);
        linker.add_subordinate(3, 50);
        linker.add_group(1, 1, "trade");
        linker.add_group(1, 2, "defence");

        let mut links = linker.add_commander(1, 50);
        links.sort_by_key(|l| l.subordinate_id);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].assignment, "trade");
        assert_eq!(links[1].assignment, "defence");
    }
}
