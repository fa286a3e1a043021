//! Order-statistics leaf nodes: a flat run of value refs.

use eyre::{ensure, Result};

use super::OST_LEAF_TAG;
use crate::error::StoreError;

/// Decoded leaf. Positions within the leaf are implicit in `value_refs`
/// order; `next_leaf_page_id` is the same stale-under-COW hint the B+Tree
/// leaves carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OstLeaf {
    pub value_refs: Vec<u64>,
    pub next_leaf_page_id: u64,
}

impl OstLeaf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.value_refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value_refs.is_empty()
    }

    /// Headerless record form: u16 count, u64 next leaf, then the refs.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.len() * 8);
        out.extend_from_slice(&(self.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.next_leaf_page_id.to_le_bytes());
        for value_ref in &self.value_refs {
            out.extend_from_slice(&value_ref.to_le_bytes());
        }
        out
    }

    pub fn deserialize(data: &[u8], page_id: u64) -> Result<Self> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            page_id,
            reason: reason.into(),
        };
        let count_bytes = data.get(0..2).ok_or(corrupt("leaf body too short"))?;
        let count = u16::from_le_bytes(count_bytes.try_into().unwrap()) as usize;
        let next_bytes = data.get(2..10).ok_or(corrupt("leaf body too short"))?;
        let next_leaf_page_id = u64::from_le_bytes(next_bytes.try_into().unwrap());

        let mut value_refs = Vec::with_capacity(count);
        for i in 0..count {
            let pos = 10 + i * 8;
            let bytes = data
                .get(pos..pos + 8)
                .ok_or(corrupt("leaf value ref past end of page"))?;
            value_refs.push(u64::from_le_bytes(bytes.try_into().unwrap()));
        }

        Ok(Self {
            value_refs,
            next_leaf_page_id,
        })
    }

    /// Wire form: tag byte followed by the record body, zero-padded to a
    /// full page.
    pub fn to_page(&self, page_size: u32) -> Result<Vec<u8>> {
        let body = self.serialize();
        ensure!(
            1 + body.len() <= page_size as usize,
            "leaf values exceed page size"
        );
        let mut page = vec![0u8; page_size as usize];
        page[0] = OST_LEAF_TAG;
        page[1..1 + body.len()].copy_from_slice(&body);
        Ok(page)
    }

    /// Decodes a tagged leaf page. The caller has already matched the tag.
    pub fn from_page(page: &[u8], page_id: u64) -> Result<Self> {
        Self::deserialize(&page[1..], page_id)
    }

    /// Splits at the midpoint; the returned leaf takes the upper half and
    /// the old next-leaf pointer.
    pub fn split(&mut self) -> OstLeaf {
        let mid = self.len() / 2;
        let right = OstLeaf {
            value_refs: self.value_refs.split_off(mid),
            next_leaf_page_id: self.next_leaf_page_id,
        };
        self.next_leaf_page_id = 0;
        right
    }
}
