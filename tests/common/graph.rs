//! Explicit-graph test game: tiers, legality, primitives and move edges are
//! all spelled out by the test, which makes hand-verified expectations
//! possible for loopy topologies the real games cannot isolate.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tiersolve::{Game, Move, Position, Tier, TierPosition, TierType, Value};

#[derive(Clone)]
pub struct NodeDef {
    pub legal: bool,
    pub primitive: Value,
    pub children: Vec<TierPosition>,
}

/// A legal, non-primitive, childless node; add edges with [`NodeDef::child`].
pub fn node() -> NodeDef {
    NodeDef {
        legal: true,
        primitive: Value::Undecided,
        children: Vec::new(),
    }
}

impl NodeDef {
    pub fn illegal(mut self) -> Self {
        self.legal = false;
        self
    }

    pub fn primitive(mut self, value: Value) -> Self {
        self.primitive = value;
        self
    }

    pub fn child(mut self, tier: Tier, position: Position) -> Self {
        self.children.push(TierPosition::new(tier, position));
        self
    }
}

#[derive(Default)]
pub struct GraphGame {
    tiers: BTreeMap<Tier, Vec<NodeDef>>,
    tier_types: HashMap<Tier, TierType>,
    canonical_tiers: HashMap<Tier, Tier>,
    provides_parents: bool,
    parents_override: HashMap<TierPosition, Vec<Position>>,
    broken_tier_symmetry: bool,
}

impl GraphGame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tier(&mut self, tier: Tier, nodes: Vec<NodeDef>) -> &mut Self {
        self.tiers.insert(tier, nodes);
        self
    }

    pub fn set_tier_type(&mut self, tier: Tier, tier_type: TierType) -> &mut Self {
        self.tier_types.insert(tier, tier_type);
        self
    }

    /// Declares `tier` symmetric to `canonical`; positions map by identity.
    pub fn set_canonical_tier(&mut self, tier: Tier, canonical: Tier) -> &mut Self {
        self.canonical_tiers.insert(tier, canonical);
        self
    }

    /// Answer parent queries by scanning the parent tier's edges instead of
    /// leaving the solver to build a reverse graph.
    pub fn with_parents(&mut self) -> &mut Self {
        self.provides_parents = true;
        self
    }

    /// Forces a specific (possibly wrong) answer for one parent query.
    /// Implies [`GraphGame::with_parents`].
    pub fn override_parents(&mut self, child: TierPosition, parents: Vec<Position>) -> &mut Self {
        self.provides_parents = true;
        self.parents_override.insert(child, parents);
        self
    }

    /// Makes `position_in_symmetric_tier` violate self-mapping, for tester
    /// tests.
    pub fn with_broken_tier_symmetry(&mut self) -> &mut Self {
        self.broken_tier_symmetry = true;
        self
    }

    fn nodes(&self, tier: Tier) -> &[NodeDef] {
        &self.tiers[&tier]
    }

    fn node(&self, tp: TierPosition) -> &NodeDef {
        &self.tiers[&tp.tier][tp.position as usize]
    }
}

impl Game for GraphGame {
    fn initial_tier(&self) -> Tier {
        *self.tiers.keys().next().expect("empty graph game")
    }

    fn initial_position(&self) -> Position {
        0
    }

    fn tier_size(&self, tier: Tier) -> i64 {
        self.nodes(tier).len() as i64
    }

    fn generate_moves(&self, tier_position: TierPosition) -> Vec<Move> {
        (0..self.node(tier_position).children.len() as Move).collect()
    }

    fn primitive(&self, tier_position: TierPosition) -> Value {
        self.node(tier_position).primitive
    }

    fn do_move(&self, tier_position: TierPosition, mv: Move) -> TierPosition {
        self.node(tier_position).children[mv as usize]
    }

    fn is_legal_position(&self, tier_position: TierPosition) -> bool {
        self.node(tier_position).legal
    }

    fn child_tiers(&self, tier: Tier) -> Vec<Tier> {
        let mut children: BTreeSet<Tier> = BTreeSet::new();
        for node in self.nodes(tier) {
            for child in &node.children {
                if child.tier != tier {
                    children.insert(child.tier);
                }
            }
        }
        children.into_iter().collect()
    }

    fn provides_parent_positions(&self) -> bool {
        self.provides_parents
    }

    fn canonical_parent_positions(&self, child: TierPosition, parent_tier: Tier) -> Vec<Position> {
        if let Some(parents) = self.parents_override.get(&child) {
            return parents.clone();
        }
        let mut parents = Vec::new();
        for (position, node) in self.nodes(parent_tier).iter().enumerate() {
            if node.legal && node.primitive == Value::Undecided && node.children.contains(&child) {
                parents.push(position as Position);
            }
        }
        parents
    }

    fn position_in_symmetric_tier(&self, tier_position: TierPosition, symmetric: Tier) -> Position {
        let _ = symmetric;
        if self.broken_tier_symmetry {
            tier_position.position + 1
        } else {
            tier_position.position
        }
    }

    fn canonical_tier(&self, tier: Tier) -> Tier {
        self.canonical_tiers.get(&tier).copied().unwrap_or(tier)
    }

    fn tier_type(&self, tier: Tier) -> TierType {
        self.tier_types.get(&tier).copied().unwrap_or(TierType::Loopy)
    }
}
