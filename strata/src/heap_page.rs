//! The slotted heap page layout.
//!
//! A page is `page_size()` bytes on disk: a bitmap of occupied slots followed
//! by `num_slots` fixed-width tuple records. In memory the page keeps the
//! parsed form; [`HeapPage::page_data`] re-serializes it byte-exactly.

use crate::tuple::{Tuple, TupleDesc};
use crate::{page_size, PageId, RecordId};
use std::io;

#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    td: TupleDesc,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
}

/// How many tuples of the given schema fit on one page, leaving one header
/// bit per slot.
pub fn slots_per_page(td: &TupleDesc) -> usize {
    (page_size() * 8) / (td.byte_size() * 8 + 1)
}

fn header_len(slots: usize) -> usize {
    slots.div_ceil(8)
}

/// The byte image of a page with every slot empty.
pub fn empty_page_data() -> Vec<u8> {
    vec![0; page_size()]
}

impl HeapPage {
    /// Parses a page from its on-disk image.
    pub fn new(pid: PageId, data: &[u8], td: TupleDesc) -> io::Result<Self> {
        if data.len() != page_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("page image is {} bytes, expected {}", data.len(), page_size()),
            ));
        }

        let slots = slots_per_page(&td);
        let header_bytes = header_len(slots);
        let header = data[..header_bytes].to_vec();

        let record_len = td.byte_size();
        let mut tuples = Vec::with_capacity(slots);
        let mut body = &data[header_bytes..];
        for slot in 0..slots {
            if bit_is_set(&header, slot) {
                let mut record = &body[..record_len];
                let mut tuple = Tuple::read_from(&mut record, &td)?;
                tuple.set_record_id(Some(RecordId::new(pid, slot as u16)));
                tuples.push(Some(tuple));
            } else {
                tuples.push(None);
            }
            body = &body[record_len..];
        }

        Ok(Self {
            pid,
            td,
            header,
            tuples,
        })
    }

    /// A freshly parsed all-empty page.
    pub fn empty(pid: PageId, td: TupleDesc) -> Self {
        let slots = slots_per_page(&td);
        Self {
            pid,
            td,
            header: vec![0; header_len(slots)],
            tuples: vec![None; slots],
        }
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn empty_slot_count(&self) -> usize {
        self.tuples.iter().filter(|t| t.is_none()).count()
    }

    pub fn slot_is_used(&self, slot: usize) -> bool {
        bit_is_set(&self.header, slot)
    }

    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        self.tuples.get(slot).and_then(|t| t.as_ref())
    }

    /// The occupied tuples of this page, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter_map(|t| t.as_ref())
    }

    /// Stores a tuple in the first empty slot and stamps its record id.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> io::Result<RecordId> {
        if !tuple.tuple_desc().compatible_with(&self.td) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "tuple schema does not match page schema",
            ));
        }
        let slot = self
            .tuples
            .iter()
            .position(|t| t.is_none())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "page is full"))?;

        let rid = RecordId::new(self.pid, slot as u16);
        tuple.set_record_id(Some(rid));
        set_bit(&mut self.header, slot, true);
        self.tuples[slot] = Some(tuple);
        Ok(rid)
    }

    /// Clears the slot named by the record id.
    pub fn delete_tuple(&mut self, rid: RecordId) -> io::Result<()> {
        if rid.page_id != self.pid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "record id names a different page",
            ));
        }
        let slot = rid.slot as usize;
        if slot >= self.tuples.len() || self.tuples[slot].is_none() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no tuple in slot {slot}"),
            ));
        }
        set_bit(&mut self.header, slot, false);
        self.tuples[slot] = None;
        Ok(())
    }

    /// Serializes the page back to its `page_size()` byte image.
    pub fn page_data(&self) -> Vec<u8> {
        let record_len = self.td.byte_size();
        let mut data = Vec::with_capacity(page_size());
        data.extend_from_slice(&self.header);
        for tuple in &self.tuples {
            match tuple {
                Some(t) => t.write_to(&mut data),
                None => data.extend(std::iter::repeat(0).take(record_len)),
            }
        }
        data.resize(page_size(), 0);
        data
    }
}

fn bit_is_set(header: &[u8], slot: usize) -> bool {
    (header[slot / 8] >> (slot % 8)) & 1 == 1
}

fn set_bit(header: &mut [u8], slot: usize, used: bool) {
    if used {
        header[slot / 8] |= 1 << (slot % 8);
    } else {
        header[slot / 8] &= !(1 << (slot % 8));
    }
}
