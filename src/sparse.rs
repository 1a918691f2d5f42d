use std::hash::Hash;

use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::common::{Interaction, ItemId};
use crate::errors::{RecError, RecResult};

/// Analogy of `scipy.sparse.csr_matrix`
/// https://docs.scipy.org/doc/scipy/reference/generated/scipy.sparse.csr_matrix.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix<T = u32, U = f32> {
    pub indices: Vec<T>,
    pub indptr: Vec<usize>,
    pub data: Vec<U>,
}

impl<T, U> CsrMatrix<T, U>
where
    T: Copy + Eq + Hash + Ord,
    U: Copy,
{
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }

    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Row `i` as (column, value) pairs, empty for out-of-range rows.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (T, U)> + '_ {
        let (start, end) = if i < self.n_rows() {
            (self.indptr[i], self.indptr[i + 1])
        } else {
            (0, 0)
        };
        (start..end).map(move |p| (self.indices[p], self.data[p]))
    }
}

impl<U: Copy> CsrMatrix<u32, U> {
    /// Swap rows and columns, `n_cols` being the column count of `self`.
    pub fn transpose(&self, n_cols: usize) -> CsrMatrix<u32, U> {
        let mut counts = vec![0usize; n_cols + 1];
        for &c in &self.indices {
            counts[c as usize + 1] += 1;
        }
        for i in 0..n_cols {
            counts[i + 1] += counts[i];
        }
        let indptr = counts.clone();
        let mut next = counts;
        let mut indices = vec![0u32; self.nnz()];
        let mut data: Vec<Option<U>> = vec![None; self.nnz()];
        for r in 0..self.n_rows() {
            for p in self.indptr[r]..self.indptr[r + 1] {
                let c = self.indices[p] as usize;
                let dest = next[c];
                // rows are visited in order, so columns of the result stay sorted
                indices[dest] = r as u32;
                data[dest] = Some(self.data[p]);
                next[c] += 1;
            }
        }
        CsrMatrix {
            indices,
            indptr,
            data: data.into_iter().flatten().collect(),
        }
    }
}

/// Analogy of `scipy.sparse.dok_matrix`
/// https://docs.scipy.org/doc/scipy/reference/generated/scipy.sparse.dok_matrix.html
pub struct DokMatrix<T = u32, U = f32> {
    data: Vec<FxHashMap<T, U>>,
}

impl<T, U> DokMatrix<T, U>
where
    T: Copy + Eq + Hash + Ord,
    U: Copy + std::ops::AddAssign,
{
    pub fn new(n_rows: usize) -> Self {
        Self {
            data: (0..n_rows).map(|_| FxHashMap::default()).collect(),
        }
    }

    /// Sum into `(row, col)`, panics if `row` is out of range.
    pub fn add(&mut self, row: usize, col: T, value: U) {
        self.data[row]
            .entry(col)
            .and_modify(|v| *v += value)
            .or_insert(value);
    }

    pub fn to_csr(&self) -> CsrMatrix<T, U> {
        let mut indices: Vec<T> = Vec::new();
        let mut indptr: Vec<usize> = vec![0];
        let mut data: Vec<U> = Vec::new();
        for d in self.data.iter() {
            if !d.is_empty() {
                let mut mapping: Vec<(&T, &U)> = d.iter().collect();
                mapping.sort_unstable_by_key(|(i, _)| *i);
                let (idx, dat): (Vec<T>, Vec<U>) = mapping.into_iter().unzip();
                indices.extend(idx);
                data.extend(dat);
            }
            // ensure keeping empty rows
            indptr.push(indices.len());
        }
        CsrMatrix {
            indices,
            indptr,
            data,
        }
    }
}

/// Bijection between external ids and dense indices `[0, n)`, assigned in ascending id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdIndex<K: Eq + Hash> {
    id_to_idx: FxHashMap<K, usize>,
    idx_to_id: Vec<K>,
}

impl<K> IdIndex<K>
where
    K: Clone + Eq + Hash + Ord,
{
    pub fn from_ids<I: IntoIterator<Item = K>>(ids: I) -> Self {
        let distinct: FxHashSet<K> = ids.into_iter().collect();
        let mut idx_to_id: Vec<K> = distinct.into_iter().collect();
        idx_to_id.sort_unstable();
        let id_to_idx = idx_to_id
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();
        Self {
            id_to_idx,
            idx_to_id,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.idx_to_id.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx_to_id.is_empty()
    }

    pub fn index_of<Q>(&self, id: &Q) -> Option<usize>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.id_to_idx.get(id).copied()
    }

    pub fn id_of(&self, idx: usize) -> Option<&K> {
        self.idx_to_id.get(idx)
    }

    pub fn ids(&self) -> &[K] {
        &self.idx_to_id
    }
}

/// Users × items matrix of summed interaction weights, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionMatrix {
    pub users: IdIndex<String>,
    pub items: IdIndex<ItemId>,
    /// rows are users
    pub user_items: CsrMatrix<u32, f32>,
    /// rows are items
    pub item_users: CsrMatrix<u32, f32>,
}

impl InteractionMatrix {
    pub fn build(records: &[Interaction]) -> RecResult<Self> {
        if let Some(bad) = records
            .iter()
            .find(|r| !r.weight.is_finite() || r.weight < 0.0)
        {
            return Err(RecError::InvalidParam(format!(
                "weight of ({}, {}) must be finite and non-negative, got {}",
                bad.user_id, bad.item_id, bad.weight
            )));
        }
        let users = IdIndex::from_ids(records.iter().map(|r| r.user_id.clone()));
        let items = IdIndex::from_ids(records.iter().map(|r| r.item_id.clone()));
        if users.is_empty() || items.is_empty() {
            return Err(RecError::InsufficientData(String::from(
                "interaction matrix",
            )));
        }
        u32::try_from(items.len())
            .map_err(|_| RecError::InvalidParam(String::from("too many items")))?;

        let mut dok: DokMatrix<u32, f32> = DokMatrix::new(users.len());
        for r in records {
            // both lookups hit, the indices were built from these records
            if let (Some(u), Some(i)) = (users.index_of(&r.user_id), items.index_of(&r.item_id)) {
                dok.add(u, i as u32, r.weight);
            }
        }
        let user_items = dok.to_csr();
        let item_users = user_items.transpose(items.len());
        Ok(Self {
            users,
            items,
            user_items,
            item_users,
        })
    }

    #[inline]
    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    #[inline]
    pub fn n_items(&self) -> usize {
        self.items.len()
    }
}
