//! B+Tree internal nodes: separator keys routing into `count + 1` children.

use eyre::{ensure, Result};
use zerocopy::little_endian::U16;
use zerocopy::{FromBytes, IntoBytes};

use super::{Comparator, NodeHeader, INTERNAL_BODY_OFFSET, NODE_HEADER_OFFSET, RESERVED_MARGIN};
use crate::error::StoreError;

/// Decoded internal node at `level > 0`. `children` always holds exactly one
/// more page id than `keys`; child `i` covers keys below `keys[i]`, child
/// `i + 1` covers keys at or above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BTreeInternal {
    pub level: u16,
    pub keys: Vec<Vec<u8>>,
    pub children: Vec<u64>,
}

impl BTreeInternal {
    pub fn new(level: u16, keys: Vec<Vec<u8>>, children: Vec<u64>) -> Self {
        debug_assert_eq!(children.len(), keys.len() + 1);
        Self {
            level,
            keys,
            children,
        }
    }

    /// Serialized size including the 32-byte reserved prefix and header.
    pub fn serialized_size(&self) -> usize {
        let keys: usize = self.keys.iter().map(|k| 4 + k.len()).sum();
        INTERNAL_BODY_OFFSET + self.children.len() * 8 + keys
    }

    pub fn is_full(&self, page_size: u32) -> bool {
        self.serialized_size() > page_size as usize - RESERVED_MARGIN
    }

    /// Index of the child to descend into for `key`: the last child whose
    /// preceding separator compares less than or equal to `key`.
    pub fn find_child_index(&self, key: &[u8], compare: Comparator) -> usize {
        self.keys
            .partition_point(|sep| compare(sep, key) != std::cmp::Ordering::Greater)
    }

    /// Splits at the middle separator, which is promoted to the parent.
    /// `self` keeps keys `[0, mid)` and children `[0, mid]`; the returned
    /// node takes keys `(mid, n)` and children `(mid, n]`.
    pub fn split(&mut self) -> (Vec<u8>, BTreeInternal) {
        let mid = self.keys.len() / 2;
        let mut right_keys = self.keys.split_off(mid);
        let promoted = right_keys.remove(0);
        let right_children = self.children.split_off(mid + 1);
        let right = BTreeInternal::new(self.level, right_keys, right_children);
        (promoted, right)
    }

    pub fn to_page(&self, page_size: u32) -> Result<Vec<u8>> {
        ensure!(
            self.serialized_size() <= page_size as usize,
            "internal node exceeds page size"
        );
        ensure!(self.level > 0, "internal node must have level > 0");

        let mut page = vec![0u8; page_size as usize];
        let header = NodeHeader {
            level: U16::new(self.level),
            count: U16::new(self.keys.len() as u16),
        };
        page[NODE_HEADER_OFFSET..INTERNAL_BODY_OFFSET].copy_from_slice(header.as_bytes());

        let mut pos = INTERNAL_BODY_OFFSET;
        for child in &self.children {
            page[pos..pos + 8].copy_from_slice(&child.to_le_bytes());
            pos += 8;
        }
        for key in &self.keys {
            page[pos..pos + 4].copy_from_slice(&(key.len() as u32).to_le_bytes());
            pos += 4;
            page[pos..pos + key.len()].copy_from_slice(key);
            pos += key.len();
        }
        Ok(page)
    }

    /// Decodes an internal page. The caller has already checked that the
    /// level field is nonzero.
    pub fn from_page(page: &[u8], page_id: u64) -> Result<Self> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            page_id,
            reason: reason.into(),
        };
        let header = NodeHeader::read_from_bytes(
            page.get(NODE_HEADER_OFFSET..INTERNAL_BODY_OFFSET)
                .ok_or(corrupt("page shorter than node header"))?,
        )
        .map_err(|_| corrupt("page shorter than node header"))?;

        let count = header.count.get() as usize;
        let mut children = Vec::with_capacity(count + 1);
        let mut pos = INTERNAL_BODY_OFFSET;
        for _ in 0..count + 1 {
            let bytes = page
                .get(pos..pos + 8)
                .ok_or(corrupt("child id past end of page"))?;
            children.push(u64::from_le_bytes(bytes.try_into().unwrap()));
            pos += 8;
        }

        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let len_bytes = page
                .get(pos..pos + 4)
                .ok_or(corrupt("separator past end of page"))?;
            let key_len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
            pos += 4;
            let key = page
                .get(pos..pos + key_len)
                .ok_or(corrupt("separator key past end of page"))?;
            pos += key_len;
            keys.push(key.to_vec());
        }

        Ok(Self {
            level: header.level.get(),
            keys,
            children,
        })
    }
}
