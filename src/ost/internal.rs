//! Order-statistics internal nodes: children paired with exact subtree
//! value counts.

use eyre::{ensure, Result};

use super::OST_INTERNAL_TAG;
use crate::error::StoreError;

/// Decoded internal node at `level > 0`. `children` and `subtree_counts`
/// always have the same length; each count is the exact number of values
/// reachable through that child and the node total is their sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OstInternal {
    pub level: u16,
    pub children: Vec<u64>,
    pub subtree_counts: Vec<u32>,
}

impl OstInternal {
    pub fn new(level: u16, children: Vec<u64>, subtree_counts: Vec<u32>) -> Self {
        debug_assert_eq!(children.len(), subtree_counts.len());
        Self {
            level,
            children,
            subtree_counts,
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Values reachable through this node.
    pub fn total_count(&self) -> u64 {
        self.subtree_counts.iter().map(|&c| c as u64).sum()
    }

    /// Maps a position to `(child index, position within that child)` by
    /// walking the cumulative counts. A position equal to the total routes
    /// into the last child at its one-past-the-end slot, which is how
    /// appends reach the rightmost leaf.
    pub fn find_child_for_position(&self, position: u64) -> Option<(usize, u64)> {
        let mut remaining = position;
        for (index, &count) in self.subtree_counts.iter().enumerate() {
            if remaining < count as u64 {
                return Some((index, remaining));
            }
            remaining -= count as u64;
        }
        if remaining == 0 && !self.is_empty() {
            let last = self.len() - 1;
            return Some((last, self.subtree_counts[last] as u64));
        }
        None
    }

    /// Record form: u16 level, u16 count, then `(u64 child, u32 count)`
    /// pairs.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.len() * 12);
        out.extend_from_slice(&self.level.to_le_bytes());
        out.extend_from_slice(&(self.len() as u16).to_le_bytes());
        for (child, count) in self.children.iter().zip(&self.subtree_counts) {
            out.extend_from_slice(&child.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
        }
        out
    }

    pub fn deserialize(data: &[u8], page_id: u64) -> Result<Self> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            page_id,
            reason: reason.into(),
        };
        let header = data.get(0..4).ok_or(corrupt("internal body too short"))?;
        let level = u16::from_le_bytes(header[0..2].try_into().unwrap());
        let count = u16::from_le_bytes(header[2..4].try_into().unwrap()) as usize;

        let mut children = Vec::with_capacity(count);
        let mut subtree_counts = Vec::with_capacity(count);
        for i in 0..count {
            let pos = 4 + i * 12;
            let pair = data
                .get(pos..pos + 12)
                .ok_or(corrupt("child entry past end of page"))?;
            children.push(u64::from_le_bytes(pair[0..8].try_into().unwrap()));
            subtree_counts.push(u32::from_le_bytes(pair[8..12].try_into().unwrap()));
        }

        Ok(Self {
            level,
            children,
            subtree_counts,
        })
    }

    pub fn to_page(&self, page_size: u32) -> Result<Vec<u8>> {
        let body = self.serialize();
        ensure!(
            1 + body.len() <= page_size as usize,
            "internal node exceeds page size"
        );
        let mut page = vec![0u8; page_size as usize];
        page[0] = OST_INTERNAL_TAG;
        page[1..1 + body.len()].copy_from_slice(&body);
        Ok(page)
    }

    /// Decodes a tagged internal page. The caller has already matched the
    /// tag.
    pub fn from_page(page: &[u8], page_id: u64) -> Result<Self> {
        Self::deserialize(&page[1..], page_id)
    }

    /// Splits at the midpoint; the returned node takes the upper half.
    pub fn split(&mut self) -> OstInternal {
        let mid = self.len() / 2;
        OstInternal {
            level: self.level,
            children: self.children.split_off(mid),
            subtree_counts: self.subtree_counts.split_off(mid),
        }
    }
}
