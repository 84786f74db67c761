//! Upward sweep over transit relation membership.
//!
//! Starting from each seed relation, repeatedly collects the transit
//! relations that contain the current frontier until no unseen parent is
//! found. The deepest level reached across all seeds supplies the root
//! candidates.

use std::collections::BTreeSet;

use osm_tiles_feature_models::OsmId;
use osm_tiles_relation::{RelationGraphLookup, is_interesting_transit_relation};

/// Result of [`recurse_up_transit_relations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traversal {
    /// Every relation seen, seeds included.
    pub all_relations: BTreeSet<OsmId>,
    /// Relations found at the deepest level.
    pub root_candidates: BTreeSet<OsmId>,
    /// Depth of the root candidates above their seed. Zero when no seed had
    /// a transit parent.
    pub root_level: usize,
}

impl Traversal {
    /// The root relation: the lowest ID among the root candidates.
    #[must_use]
    pub fn root_relation_id(&self) -> Option<OsmId> {
        self.root_candidates.first().copied()
    }
}

#[derive(Debug, Default)]
struct RootCandidates {
    level: usize,
    ids: BTreeSet<OsmId>,
}

impl RootCandidates {
    /// Seeds count as roots only until some seed has found a parent.
    fn seed(&mut self, seed: OsmId) {
        if self.level == 0 {
            self.ids.insert(seed);
        }
    }

    fn offer(&mut self, level: usize, found: &BTreeSet<OsmId>) {
        if found.is_empty() {
            return;
        }
        match level.cmp(&self.level) {
            std::cmp::Ordering::Greater => {
                self.ids.clone_from(found);
                self.level = level;
            }
            std::cmp::Ordering::Equal => self.ids.extend(found.iter().copied()),
            std::cmp::Ordering::Less => {}
        }
    }
}

/// Parents of a relation that pass the transit predicate.
///
/// The lookup may or may not filter already; relations it cannot resolve
/// are dropped.
fn transit_parents<L: RelationGraphLookup + ?Sized>(osm: &L, rel_id: OsmId) -> BTreeSet<OsmId> {
    osm.transit_relations(rel_id)
        .into_iter()
        .filter(|&parent| {
            osm.relation(parent)
                .is_some_and(|rel| is_interesting_transit_relation(&rel.tags))
        })
        .collect()
}

/// Levels of unseen parents above one seed. `levels[0]` holds the relations
/// one step up. Also returns everything seen, seed included.
fn sweep_up<L: RelationGraphLookup + ?Sized>(
    osm: &L,
    seed: OsmId,
) -> (Vec<BTreeSet<OsmId>>, BTreeSet<OsmId>) {
    let mut seen = BTreeSet::from([seed]);
    let mut front = seen.clone();
    let mut levels = Vec::new();

    while !front.is_empty() {
        let found: BTreeSet<OsmId> = front
            .iter()
            .flat_map(|&rel_id| transit_parents(osm, rel_id))
            .filter(|id| !seen.contains(id))
            .collect();

        seen.extend(found.iter().copied());
        if !found.is_empty() {
            levels.push(found.clone());
        }
        front = found;
    }

    (levels, seen)
}

/// Sweeps upward from every seed and picks the root candidates.
///
/// Seeds are processed in ascending ID order. A deeper level than any seen
/// so far replaces the root candidates; an equal level adds to them. Seeds
/// are candidates themselves only while no parent has been found.
pub fn recurse_up_transit_relations<L: RelationGraphLookup + ?Sized>(
    seeds: &BTreeSet<OsmId>,
    osm: &L,
) -> Traversal {
    let (roots, all_relations) = seeds.iter().fold(
        (RootCandidates::default(), BTreeSet::new()),
        |(mut roots, mut all), &seed| {
            roots.seed(seed);

            let (levels, mut seen) = sweep_up(osm, seed);
            for (depth, found) in levels.iter().enumerate() {
                roots.offer(depth + 1, found);
            }

            all.append(&mut seen);
            (roots, all)
        },
    );

    Traversal {
        all_relations,
        root_candidates: roots.ids,
        root_level: roots.level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;

    const STOP_AREA: &[(&str, &str)] = &[("public_transport", "stop_area")];
    const SITE: &[(&str, &str)] = &[("type", "site")];

    #[test]
    fn chain_reaches_furthest_relation() {
        let osm = Fixture::default()
            .with_relation(1, STOP_AREA, &[], &[], &[])
            .with_relation(2, SITE, &[], &[], &[1])
            .with_relation(3, SITE, &[], &[], &[2])
            .with_relation(4, SITE, &[], &[], &[3]);

        let traversal = recurse_up_transit_relations(&BTreeSet::from([1]), &osm);

        assert_eq!(traversal.all_relations, BTreeSet::from([1, 2, 3, 4]));
        assert_eq!(traversal.root_candidates, BTreeSet::from([4]));
        assert_eq!(traversal.root_level, 3);
        assert_eq!(traversal.root_relation_id(), Some(4));
    }

    #[test]
    fn cycles_terminate() {
        let osm = Fixture::default()
            .with_relation(1, STOP_AREA, &[], &[], &[2])
            .with_relation(2, STOP_AREA, &[], &[], &[1]);

        let traversal = recurse_up_transit_relations(&BTreeSet::from([1]), &osm);

        assert_eq!(traversal.all_relations, BTreeSet::from([1, 2]));
        assert_eq!(traversal.root_relation_id(), Some(2));
    }

    #[test]
    fn equal_depth_roots_are_unioned() {
        let osm = Fixture::default()
            .with_relation(1, STOP_AREA, &[], &[], &[])
            .with_relation(7, SITE, &[], &[], &[1])
            .with_relation(5, STOP_AREA, &[], &[], &[])
            .with_relation(6, SITE, &[], &[], &[5]);

        let traversal = recurse_up_transit_relations(&BTreeSet::from([1, 5]), &osm);

        assert_eq!(traversal.root_candidates, BTreeSet::from([6, 7]));
        assert_eq!(traversal.root_level, 1);
        assert_eq!(traversal.root_relation_id(), Some(6));
    }

    #[test]
    fn deeper_seed_replaces_roots() {
        let osm = Fixture::default()
            .with_relation(1, STOP_AREA, &[], &[], &[])
            .with_relation(2, SITE, &[], &[], &[1])
            .with_relation(5, STOP_AREA, &[], &[], &[])
            .with_relation(6, SITE, &[], &[], &[5])
            .with_relation(8, SITE, &[], &[], &[6]);

        let traversal = recurse_up_transit_relations(&BTreeSet::from([1, 5]), &osm);

        assert_eq!(traversal.root_candidates, BTreeSet::from([8]));
        assert_eq!(traversal.root_level, 2);
    }

    #[test]
    fn parentless_seeds_are_roots_until_a_parent_is_found() {
        let osm = Fixture::default()
            .with_relation(3, STOP_AREA, &[], &[], &[])
            .with_relation(8, STOP_AREA, &[], &[], &[]);
        let traversal = recurse_up_transit_relations(&BTreeSet::from([3, 8]), &osm);
        assert_eq!(traversal.root_candidates, BTreeSet::from([3, 8]));
        assert_eq!(traversal.root_relation_id(), Some(3));

        // once seed 1 has found a parent, later parentless seeds are not added
        let osm = Fixture::default()
            .with_relation(1, STOP_AREA, &[], &[], &[])
            .with_relation(2, SITE, &[], &[], &[1])
            .with_relation(9, STOP_AREA, &[], &[], &[]);
        let traversal = recurse_up_transit_relations(&BTreeSet::from([1, 9]), &osm);
        assert_eq!(traversal.root_candidates, BTreeSet::from([2]));
        assert!(traversal.all_relations.contains(&9));
    }

    #[test]
    fn uninteresting_parents_are_ignored() {
        let osm = Fixture::default()
            .with_relation(1, STOP_AREA, &[], &[], &[])
            .with_relation(2, &[("type", "route"), ("route", "train")], &[], &[], &[1]);

        let traversal = recurse_up_transit_relations(&BTreeSet::from([1]), &osm);

        assert_eq!(traversal.all_relations, BTreeSet::from([1]));
        assert_eq!(traversal.root_level, 0);
    }

    #[test]
    fn no_seeds_has_no_root() {
        let traversal = recurse_up_transit_relations(&BTreeSet::new(), &Fixture::default());
        assert!(traversal.all_relations.is_empty());
        assert_eq!(traversal.root_relation_id(), None);
    }
}
