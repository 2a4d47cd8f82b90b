//! Overlap grouping.
//!
//! Pools from different clouds that must be reconciled as one address space
//! are linked when either side declares the other cloud in `shared_with`, or
//! when their networks overlap. Groups are the connected components of that
//! relation with at least two members.
//!
//! Group identity never depends on discovery order: every group is keyed by
//! its canonical member (widest network, then lowest network address, then
//! cloud order, then configuration order) and groups are numbered by that key.

use std::cmp::Ordering;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use super::math::overlaps;
use super::registry::{NetworkPool, PoolIndex, PoolRegistry};

pub type GroupId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapGroup {
    pub id: GroupId,
    /// Network of the canonical member
    pub key: Ipv4Net,
    /// The member counted in global totals
    pub canonical: PoolIndex,
    /// Members in registry order
    pub members: Vec<PoolIndex>,
    /// Distinct member networks, ascending
    pub networks: Vec<Ipv4Net>,
}

impl OverlapGroup {
    /// Whether `ip` belongs to any member network
    pub fn covers(&self, ip: &Ipv4Addr) -> bool {
        self.networks.iter().any(|net| net.contains(ip))
    }

    pub fn contains_pool(&self, index: PoolIndex) -> bool {
        self.members.binary_search(&index).is_ok()
    }
}

/// Partition of the shared subset of pools into overlap groups
#[derive(Debug, Clone, Default)]
pub struct OverlapGroups {
    groups: Vec<OverlapGroup>,
    membership: Vec<Option<GroupId>>,
}

impl OverlapGroups {
    pub fn build(registry: &PoolRegistry) -> Self {
        let pools = registry.pools();
        let mut sets = DisjointSet::new(pools.len());

        for (i, p) in pools.iter().enumerate() {
            for (j, q) in pools.iter().enumerate().skip(i + 1) {
                if p.cloud != q.cloud && linked(p, q) {
                    sets.union(i, j);
                }
            }
        }

        let mut components: Vec<Vec<PoolIndex>> = vec![Vec::new(); pools.len()];
        for i in 0..pools.len() {
            let root = sets.find(i);
            components[root].push(i);
        }

        let mut groups: Vec<OverlapGroup> = components
            .into_iter()
            .filter(|members| members.len() >= 2)
            .map(|members| {
                let canonical = members
                    .iter()
                    .copied()
                    .min_by(|a, b| canonical_order(registry, *a, *b))
                    .unwrap_or(members[0]);
                let mut networks: Vec<Ipv4Net> = members.iter().map(|i| pools[*i].cidr).collect();
                networks.sort();
                networks.dedup();
                OverlapGroup {
                    id: 0,
                    key: pools[canonical].cidr,
                    canonical,
                    members,
                    networks,
                }
            })
            .collect();

        groups.sort_by(|a, b| canonical_order(registry, a.canonical, b.canonical));

        let mut membership = vec![None; pools.len()];
        for (id, group) in groups.iter_mut().enumerate() {
            group.id = id;
            for member in &group.members {
                membership[*member] = Some(id);
            }
            log::debug!(
                "Overlap group {} ({}): {}",
                id,
                group.key,
                group
                    .members
                    .iter()
                    .map(|i| pools[*i].key())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        log::info!(
            "Found {} overlap groups covering {} of {} pools",
            groups.len(),
            membership.iter().filter(|m| m.is_some()).count(),
            pools.len()
        );

        OverlapGroups { groups, membership }
    }

    pub fn groups(&self) -> &[OverlapGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&OverlapGroup> {
        self.groups.get(id)
    }

    pub fn group_of(&self, index: PoolIndex) -> Option<&OverlapGroup> {
        self.membership
            .get(index)
            .copied()
            .flatten()
            .map(|id| &self.groups[id])
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Explicit sharing in either direction, or overlapping networks
fn linked(p: &NetworkPool, q: &NetworkPool) -> bool {
    p.shared_with.contains(&q.cloud)
        || q.shared_with.contains(&p.cloud)
        || overlaps(&p.cidr, &q.cidr)
}

/// Widest network first, then lowest address, then registry order
/// (which is cloud order, then configuration order)
fn canonical_order(registry: &PoolRegistry, a: PoolIndex, b: PoolIndex) -> Ordering {
    let (pa, pb) = (registry.pool(a), registry.pool(b));
    pa.cidr
        .prefix_len()
        .cmp(&pb.cidr.prefix_len())
        .then_with(|| pa.cidr.network().cmp(&pb.cidr.network()))
        .then_with(|| a.cmp(&b))
}

/// Union-find over pool indices
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        DisjointSet {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            Ordering::Less => self.parent[ra] = rb,
            Ordering::Greater => self.parent[rb] = ra,
            Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}
