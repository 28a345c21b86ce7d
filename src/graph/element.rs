//! Element tables for vertices, transactions and links
//!
//! Every table keeps a dense position array (position -> id) alongside the
//! inverse id -> position index so elements can be enumerated by position and
//! looked up by id in O(1). Removing an element swaps the last element into
//! the freed position; removed ids go on a LIFO free list for reuse.

use super::types::{Direction, Incidence, LinkId, TransactionId, VertexId};
use rustc_hash::FxHashMap;

/// Position/id bookkeeping shared by all element kinds
#[derive(Debug, Clone, Default)]
pub(crate) struct ElementTable {
    /// position -> id
    positions: Vec<u32>,
    /// id -> position
    index: Vec<Option<u32>>,
    /// id -> uid
    uids: Vec<u64>,
    /// Free ids for reuse
    free: Vec<u32>,
}

impl ElementTable {
    pub fn with_capacity(capacity: usize) -> Self {
        ElementTable {
            positions: Vec::with_capacity(capacity),
            index: Vec::with_capacity(capacity),
            uids: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// One past the highest id ever handed out
    pub fn capacity(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, id: u32) -> bool {
        matches!(self.index.get(id as usize), Some(Some(_)))
    }

    pub fn id_at(&self, position: usize) -> Option<u32> {
        self.positions.get(position).copied()
    }

    pub fn position_of(&self, id: u32) -> Option<usize> {
        self.index.get(id as usize).copied().flatten().map(|p| p as usize)
    }

    pub fn uid(&self, id: u32) -> Option<u64> {
        if self.contains(id) {
            self.uids.get(id as usize).copied()
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn ids(&self) -> &[u32] {
        &self.positions
    }

    /// The id the next insertion without an explicit id would use
    pub fn next_id(&self) -> u32 {
        self.free.last().copied().unwrap_or(self.index.len() as u32)
    }

    /// Insert an element under an explicit id.
    ///
    /// Returns false if the id is already in use. Ids skipped over when the
    /// table grows are placed on the free list.
    pub fn insert(&mut self, id: u32, uid: u64) -> bool {
        let idx = id as usize;
        if idx < self.index.len() {
            if self.index[idx].is_some() {
                return false;
            }
            if let Some(pos) = self.free.iter().rposition(|&f| f == id) {
                self.free.remove(pos);
            }
        } else {
            for gap in (self.index.len()..idx).rev() {
                self.free.push(gap as u32);
            }
            self.index.resize(idx + 1, None);
            self.uids.resize(idx + 1, 0);
        }
        self.index[idx] = Some(self.positions.len() as u32);
        self.uids[idx] = uid;
        self.positions.push(id);
        true
    }

    /// Remove an element, returning the position it occupied
    pub fn remove(&mut self, id: u32) -> Option<usize> {
        let position = self.index.get_mut(id as usize)?.take()? as usize;
        self.positions.swap_remove(position);
        if let Some(&moved) = self.positions.get(position) {
            self.index[moved as usize] = Some(position as u32);
        }
        self.free.push(id);
        Some(position)
    }
}

/// Endpoint and link data of one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransactionRecord {
    pub source: VertexId,
    pub destination: VertexId,
    pub direction: Direction,
    pub link: LinkId,
}

impl TransactionRecord {
    pub fn is_directed(&self) -> bool {
        self.direction.is_directed()
    }
}

#[derive(Debug, Clone, Default)]
struct LinkRecord {
    low: u32,
    high: u32,
    /// Transactions by direction slot (uphill, downhill, flat)
    transactions: [Vec<u32>; 3],
}

impl LinkRecord {
    fn count(&self) -> usize {
        self.transactions.iter().map(Vec::len).sum()
    }
}

/// Vertices, transactions and the links aggregating them
#[derive(Debug, Clone, Default)]
pub(crate) struct Topology {
    vertices: ElementTable,
    /// Incident transactions per vertex id
    vertex_transactions: Vec<Vec<u32>>,
    /// Links per vertex id
    vertex_links: Vec<Vec<u32>>,

    transactions: ElementTable,
    records: Vec<Option<TransactionRecord>>,

    links: ElementTable,
    link_records: Vec<Option<LinkRecord>>,
    /// (low vertex, high vertex) -> link
    link_index: FxHashMap<(u32, u32), u32>,
}

impl Topology {
    pub fn with_capacity(vertices: usize, transactions: usize) -> Self {
        Topology {
            vertices: ElementTable::with_capacity(vertices),
            vertex_transactions: Vec::with_capacity(vertices),
            vertex_links: Vec::with_capacity(vertices),
            transactions: ElementTable::with_capacity(transactions),
            records: Vec::with_capacity(transactions),
            links: ElementTable::with_capacity(transactions),
            link_records: Vec::with_capacity(transactions),
            link_index: FxHashMap::default(),
        }
    }

    // ============================================================
    // Vertices
    // ============================================================

    pub fn vertices(&self) -> &ElementTable {
        &self.vertices
    }

    pub fn next_vertex_id(&self) -> VertexId {
        VertexId(self.vertices.next_id())
    }

    pub fn has_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains(id.0)
    }

    pub fn insert_vertex(&mut self, id: VertexId, uid: u64) -> bool {
        if !self.vertices.insert(id.0, uid) {
            return false;
        }
        if id.index() >= self.vertex_transactions.len() {
            self.vertex_transactions.resize(id.index() + 1, Vec::new());
            self.vertex_links.resize(id.index() + 1, Vec::new());
        }
        true
    }

    /// Remove a vertex that has no incident transactions left
    pub fn remove_vertex(&mut self, id: VertexId) -> bool {
        if self
            .vertex_transactions
            .get(id.index())
            .map_or(false, |t| !t.is_empty())
        {
            return false;
        }
        self.vertices.remove(id.0).is_some()
    }

    pub fn vertex_transactions(&self, id: VertexId) -> &[u32] {
        self.vertex_transactions
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn vertex_links(&self, id: VertexId) -> &[u32] {
        self.vertex_links
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn vertex_transaction_count_in(&self, id: VertexId, incidence: Incidence) -> usize {
        self.vertex_transactions(id)
            .iter()
            .filter_map(|&t| self.transaction(TransactionId(t)))
            .filter(|record| match incidence {
                Incidence::Outgoing => record.is_directed() && record.source == id,
                Incidence::Incoming => record.is_directed() && record.destination == id,
                Incidence::Undirected => !record.is_directed(),
            })
            .count()
    }

    // ============================================================
    // Transactions
    // ============================================================

    pub fn transactions(&self) -> &ElementTable {
        &self.transactions
    }

    pub fn next_transaction_id(&self) -> TransactionId {
        TransactionId(self.transactions.next_id())
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&TransactionRecord> {
        self.records.get(id.index()).and_then(Option::as_ref)
    }

    /// The link a new transaction between the two vertices would join
    pub fn link_for_pair(&self, a: VertexId, b: VertexId) -> LinkId {
        let key = (a.0.min(b.0), a.0.max(b.0));
        LinkId(
            self.link_index
                .get(&key)
                .copied()
                .unwrap_or_else(|| self.links.next_id()),
        )
    }

    /// Insert a transaction under explicit transaction and link ids.
    ///
    /// Both endpoints must already exist. If the endpoints already share a
    /// link, that link is used and `link` is ignored.
    pub fn insert_transaction(
        &mut self,
        id: TransactionId,
        source: VertexId,
        destination: VertexId,
        direction: Direction,
        link: LinkId,
        uid: u64,
    ) -> Option<LinkId> {
        if !self.has_vertex(source) || !self.has_vertex(destination) {
            return None;
        }
        if !self.transactions.insert(id.0, uid) {
            return None;
        }
        let key = (source.0.min(destination.0), source.0.max(destination.0));
        let link = match self.link_index.get(&key) {
            Some(&existing) => existing,
            None => {
                if !self.links.insert(link.0, 0) {
                    self.transactions.remove(id.0);
                    return None;
                }
                if link.index() >= self.link_records.len() {
                    self.link_records.resize(link.index() + 1, None);
                }
                self.link_records[link.index()] = Some(LinkRecord {
                    low: key.0,
                    high: key.1,
                    ..Default::default()
                });
                self.link_index.insert(key, link.0);
                self.vertex_links[source.index()].push(link.0);
                if source != destination {
                    self.vertex_links[destination.index()].push(link.0);
                }
                link.0
            }
        };
        if let Some(record) = self.link_records[link as usize].as_mut() {
            record.transactions[direction.slot()].push(id.0);
        }

        if id.index() >= self.records.len() {
            self.records.resize(id.index() + 1, None);
        }
        self.records[id.index()] = Some(TransactionRecord {
            source,
            destination,
            direction,
            link: LinkId(link),
        });
        self.vertex_transactions[source.index()].push(id.0);
        if source != destination {
            self.vertex_transactions[destination.index()].push(id.0);
        }
        Some(LinkId(link))
    }

    /// Remove a transaction, dropping its link if it was the last member
    pub fn remove_transaction(&mut self, id: TransactionId) -> Option<TransactionRecord> {
        let record = self.records.get_mut(id.index())?.take()?;
        self.transactions.remove(id.0);

        for vertex in [record.source, record.destination] {
            if let Some(list) = self.vertex_transactions.get_mut(vertex.index()) {
                if let Some(pos) = list.iter().position(|&t| t == id.0) {
                    list.swap_remove(pos);
                }
            }
        }

        let link = record.link.index();
        let emptied = match self.link_records.get_mut(link).and_then(Option::as_mut) {
            Some(link_record) => {
                let list = &mut link_record.transactions[record.direction.slot()];
                if let Some(pos) = list.iter().position(|&t| t == id.0) {
                    list.swap_remove(pos);
                }
                link_record.count() == 0
            }
            None => false,
        };
        if emptied {
            if let Some(link_record) = self.link_records[link].take() {
                self.link_index.remove(&(link_record.low, link_record.high));
                for vertex in [link_record.low, link_record.high] {
                    if let Some(list) = self.vertex_links.get_mut(vertex as usize) {
                        list.retain(|&l| l != record.link.0);
                    }
                }
            }
            self.links.remove(record.link.0);
        }
        Some(record)
    }

    // ============================================================
    // Links
    // ============================================================

    pub fn links(&self) -> &ElementTable {
        &self.links
    }

    fn link_record(&self, id: LinkId) -> Option<&LinkRecord> {
        self.link_records.get(id.index()).and_then(Option::as_ref)
    }

    pub fn has_link(&self, id: LinkId) -> bool {
        self.link_record(id).is_some()
    }

    pub fn link_between(&self, a: VertexId, b: VertexId) -> Option<LinkId> {
        self.link_index
            .get(&(a.0.min(b.0), a.0.max(b.0)))
            .map(|&l| LinkId(l))
    }

    pub fn link_endpoints(&self, id: LinkId) -> Option<(VertexId, VertexId)> {
        self.link_record(id)
            .map(|r| (VertexId(r.low), VertexId(r.high)))
    }

    pub fn link_transaction_count(&self, id: LinkId) -> Option<usize> {
        self.link_record(id).map(LinkRecord::count)
    }

    pub fn link_transactions_in(&self, id: LinkId, direction: Direction) -> Option<&[u32]> {
        self.link_record(id)
            .map(|r| r.transactions[direction.slot()].as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_insert_and_lifo_reuse() {
        let mut table = ElementTable::default();
        for id in 0..3 {
            assert_eq!(table.next_id(), id);
            assert!(table.insert(id, u64::from(id)));
        }
        table.remove(0);
        table.remove(2);
        assert_eq!(table.next_id(), 2);
        assert!(table.insert(2, 10));
        assert_eq!(table.next_id(), 0);
        assert_eq!(table.uid(2), Some(10));
        assert_eq!(table.uid(0), None);
    }

    #[test]
    fn test_table_swap_remove_positions() {
        let mut table = ElementTable::default();
        for id in 0..4 {
            table.insert(id, 0);
        }
        assert_eq!(table.remove(1), Some(1));
        assert_eq!(table.ids(), &[0, 3, 2]);
        assert_eq!(table.position_of(3), Some(1));
        assert_eq!(table.position_of(1), None);
        assert_eq!(table.id_at(2), Some(2));
    }

    #[test]
    fn test_table_explicit_id_fills_gaps() {
        let mut table = ElementTable::default();
        assert!(table.insert(3, 0));
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.next_id(), 0);
        assert!(table.insert(1, 0));
        assert!(!table.insert(1, 0));
        assert_eq!(table.next_id(), 0);
        table.insert(0, 0);
        assert_eq!(table.next_id(), 2);
        table.insert(2, 0);
        assert_eq!(table.next_id(), 4);
    }

    fn topology_with_vertices(n: u32) -> Topology {
        let mut topology = Topology::default();
        for id in 0..n {
            topology.insert_vertex(VertexId(id), 0);
        }
        topology
    }

    #[test]
    fn test_links_aggregate_transactions() {
        let mut topology = topology_with_vertices(3);
        let v0 = VertexId(0);
        let v1 = VertexId(1);

        let link = topology.link_for_pair(v0, v1);
        topology
            .insert_transaction(TransactionId(0), v0, v1, Direction::Uphill, link, 0)
            .unwrap();
        let link2 = topology.link_for_pair(v1, v0);
        assert_eq!(link, link2);
        topology
            .insert_transaction(TransactionId(1), v1, v0, Direction::Downhill, link2, 0)
            .unwrap();

        assert_eq!(topology.link_between(v1, v0), Some(link));
        assert_eq!(topology.link_transaction_count(link), Some(2));
        assert_eq!(topology.link_transactions_in(link, Direction::Downhill), Some(&[1u32][..]));
        assert_eq!(topology.vertex_links(v0), &[link.0]);
        assert_eq!(topology.vertex_transaction_count_in(v0, Incidence::Outgoing), 1);
        assert_eq!(topology.vertex_transaction_count_in(v0, Incidence::Incoming), 1);

        topology.remove_transaction(TransactionId(0)).unwrap();
        assert!(topology.has_link(link));
        topology.remove_transaction(TransactionId(1)).unwrap();
        assert!(!topology.has_link(link));
        assert_eq!(topology.link_between(v0, v1), None);
        assert!(topology.vertex_links(v1).is_empty());
    }

    #[test]
    fn test_self_loop_listed_once() {
        let mut topology = topology_with_vertices(1);
        let v = VertexId(0);
        let link = topology.link_for_pair(v, v);
        topology
            .insert_transaction(TransactionId(0), v, v, Direction::Uphill, link, 0)
            .unwrap();
        assert_eq!(topology.vertex_transactions(v).len(), 1);
        assert_eq!(topology.vertex_links(v).len(), 1);
        assert_eq!(topology.link_endpoints(link), Some((v, v)));
    }

    #[test]
    fn test_vertex_with_transactions_not_removed() {
        let mut topology = topology_with_vertices(2);
        let link = topology.link_for_pair(VertexId(0), VertexId(1));
        topology
            .insert_transaction(TransactionId(0), VertexId(0), VertexId(1), Direction::Flat, link, 0)
            .unwrap();
        assert!(!topology.remove_vertex(VertexId(0)));
        topology.remove_transaction(TransactionId(0));
        assert!(topology.remove_vertex(VertexId(0)));
        assert!(!topology.has_vertex(VertexId(0)));
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let mut topology = topology_with_vertices(1);
        let link = topology.link_for_pair(VertexId(0), VertexId(5));
        assert!(topology
            .insert_transaction(TransactionId(0), VertexId(0), VertexId(5), Direction::Flat, link, 0)
            .is_none());
        assert_eq!(topology.transactions().len(), 0);
    }
}
