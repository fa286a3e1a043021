//! B+Tree leaf nodes: sorted `(key, value_ref)` entries plus an
//! opportunistic next-leaf hint.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U16, U64};
use zerocopy::{FromBytes, IntoBytes};

use super::{Comparator, LeafHeader, LEAF_BODY_OFFSET, NODE_HEADER_OFFSET, RESERVED_MARGIN};
use crate::error::StoreError;

/// Decoded leaf node. Keys are strictly increasing under the tree's
/// comparator; `keys` and `value_refs` always have the same length.
///
/// `next_leaf_page_id` points at the right sibling that existed when this
/// page was written. Later copy-on-write mutations do not update it, so it
/// is a hint for sequential readers, never an authority on tree shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BTreeLeaf {
    pub keys: Vec<Vec<u8>>,
    pub value_refs: Vec<u64>,
    pub next_leaf_page_id: u64,
}

impl BTreeLeaf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Serialized size including the 32-byte reserved prefix and header.
    pub fn serialized_size(&self) -> usize {
        let entries: usize = self.keys.iter().map(|k| 12 + k.len()).sum();
        LEAF_BODY_OFFSET + entries
    }

    pub fn is_full(&self, page_size: u32) -> bool {
        self.serialized_size() > page_size as usize - RESERVED_MARGIN
    }

    /// Binary search for `key`: `Ok(index)` on a match, `Err(insertion_point)`
    /// otherwise.
    pub fn find(&self, key: &[u8], compare: Comparator) -> Result<usize, usize> {
        self.keys.binary_search_by(|probe| compare(probe, key))
    }

    /// Splits at the midpoint. `self` keeps the left half; the returned leaf
    /// takes the right half together with the old next-leaf pointer. The
    /// separator to promote is the right half's first key.
    pub fn split(&mut self) -> BTreeLeaf {
        let mid = self.len() / 2;
        let right = BTreeLeaf {
            keys: self.keys.split_off(mid),
            value_refs: self.value_refs.split_off(mid),
            next_leaf_page_id: self.next_leaf_page_id,
        };
        self.next_leaf_page_id = 0;
        right
    }

    /// Encodes into a fresh zero-filled page buffer.
    pub fn to_page(&self, page_size: u32) -> Result<Vec<u8>> {
        ensure!(
            self.serialized_size() <= page_size as usize,
            "leaf entries exceed page size"
        );

        let mut page = vec![0u8; page_size as usize];
        let header = LeafHeader {
            level: U16::new(0),
            count: U16::new(self.len() as u16),
            next_leaf: U64::new(self.next_leaf_page_id),
        };
        page[NODE_HEADER_OFFSET..LEAF_BODY_OFFSET].copy_from_slice(header.as_bytes());

        let mut pos = LEAF_BODY_OFFSET;
        for (key, value_ref) in self.keys.iter().zip(&self.value_refs) {
            page[pos..pos + 4].copy_from_slice(&(key.len() as u32).to_le_bytes());
            pos += 4;
            page[pos..pos + key.len()].copy_from_slice(key);
            pos += key.len();
            page[pos..pos + 8].copy_from_slice(&value_ref.to_le_bytes());
            pos += 8;
        }
        Ok(page)
    }

    /// Decodes a leaf page. The caller has already checked that the level
    /// field is zero.
    pub fn from_page(page: &[u8], page_id: u64) -> Result<Self> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            page_id,
            reason: reason.into(),
        };
        let header = LeafHeader::read_from_bytes(
            page.get(NODE_HEADER_OFFSET..LEAF_BODY_OFFSET)
                .ok_or(corrupt("page shorter than leaf header"))?,
        )
        .map_err(|_| corrupt("page shorter than leaf header"))?;

        let count = header.count.get() as usize;
        let mut keys = Vec::with_capacity(count);
        let mut value_refs = Vec::with_capacity(count);
        let mut pos = LEAF_BODY_OFFSET;
        for _ in 0..count {
            let len_bytes = page
                .get(pos..pos + 4)
                .ok_or(corrupt("leaf entry past end of page"))?;
            let key_len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
            pos += 4;
            let key = page
                .get(pos..pos + key_len)
                .ok_or(corrupt("leaf key past end of page"))?;
            pos += key_len;
            let ref_bytes = page
                .get(pos..pos + 8)
                .ok_or(corrupt("leaf value ref past end of page"))?;
            pos += 8;
            keys.push(key.to_vec());
            value_refs.push(u64::from_le_bytes(ref_bytes.try_into().unwrap()));
        }

        Ok(Self {
            keys,
            value_refs,
            next_leaf_page_id: header.next_leaf.get(),
        })
    }
}
