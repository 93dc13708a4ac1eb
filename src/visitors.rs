//! Fixed-size table of the peers that have visited the web server.
//!
//! A peer is identified by its IP address only. When the table is full, a new
//! peer replaces the record with the fewest visits.

use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub addr: IpAddr,
    pub count: u64,
    pub authorized: bool,
}

impl ClientRecord {
    fn new(addr: IpAddr) -> Self {
        Self {
            addr,
            count: 0,
            authorized: false,
        }
    }

    pub fn record_visit(&mut self) {
        self.count += 1;
    }
}

#[derive(Debug, Clone)]
pub struct VisitorRegistry {
    slots: Vec<Option<ClientRecord>>,
}

impl VisitorRegistry {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "visitor table capacity must be non-zero");
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the slot index holding `addr`, if any.
    pub fn position(&self, addr: IpAddr) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|r| r.addr == addr))
    }

    pub fn get(&self, addr: IpAddr) -> Option<&ClientRecord> {
        self.position(addr).and_then(|i| self.slots[i].as_ref())
    }

    pub fn get_mut(&mut self, addr: IpAddr) -> Option<&mut ClientRecord> {
        let index = self.position(addr)?;
        self.slots[index].as_mut()
    }

    /// Finds the record for `addr`, creating one if needed.
    ///
    /// A new record goes into the first empty slot, or else replaces the
    /// record with the lowest visit count (lowest slot index on ties).
    pub fn lookup_or_create(&mut self, addr: IpAddr) -> &mut ClientRecord {
        let index = match self.position(addr) {
            Some(index) => index,
            None => {
                let index = self.replacement_slot();
                if let Some(evicted) = &self.slots[index] {
                    tracing::debug!(
                        evicted = %evicted.addr,
                        count = evicted.count,
                        replacement = %addr,
                        "Visitor table full, evicting least visited"
                    );
                }
                self.slots[index] = Some(ClientRecord::new(addr));
                index
            }
        };

        self.slots[index]
            .get_or_insert_with(|| ClientRecord::new(addr))
    }

    fn replacement_slot(&self) -> usize {
        if let Some(empty) = self.slots.iter().position(Option::is_none) {
            return empty;
        }
        let mut min_index = 0;
        let mut min_count = u64::MAX;
        for (index, record) in self.slots.iter().enumerate() {
            if let Some(record) = record {
                if record.count < min_count {
                    min_index = index;
                    min_count = record.count;
                }
            }
        }
        min_index
    }

    /// Occupied records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &ClientRecord> {
        self.slots.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    #[test]
    fn fills_empty_slots_in_order() {
        let mut reg = VisitorRegistry::new(3);
        reg.lookup_or_create(ip(1));
        reg.lookup_or_create(ip(2));
        assert_eq!(reg.position(ip(1)), Some(0));
        assert_eq!(reg.position(ip(2)), Some(1));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn eviction_prefers_lowest_index_on_tie() {
        let mut reg = VisitorRegistry::new(2);
        reg.lookup_or_create(ip(1)).record_visit();
        reg.lookup_or_create(ip(2)).record_visit();
        reg.lookup_or_create(ip(3));
        assert_eq!(reg.position(ip(3)), Some(0));
        assert!(reg.get(ip(1)).is_none());
        assert!(reg.get(ip(2)).is_some());
    }
}
