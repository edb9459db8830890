//! Sparse response store for item response models.
//!
//! Purpose
//! -------
//! Hold the observed responses of every person as a contiguous slice of
//! `(item, category)` pairs in flattened arrays, together with each person's
//! group label. The store is validated once and read-only for the rest of a
//! run; every E-step reads it concurrently.
//!
//! Invariants & assumptions
//! ------------------------
//! - `offsets.len() == n_persons + 1`, `offsets[0] == 0`, offsets are
//!   non-decreasing and `offsets[n_persons] == items.len()`.
//! - `items.len() == categories.len()`; every item index is `< n_items`.
//! - Every group label is `< n_groups` and every group has at least one
//!   person.
//! - Categories are checked against a model with
//!   [`ResponseData::validate_categories`] once item parameters are known.
//!
//! Conventions
//! -----------
//! - Persons, items, categories and groups are 0-based.
//! - A person may attempt any subset of items, including none; such a
//!   person's posterior equals the group prior.
//!
//! Testing notes
//! -------------
//! - Unit tests cover each validation branch, the person-list constructor,
//!   and group sizes.
use crate::irt::errors::{IrtError, IrtResult};

/// Validated sparse responses plus group labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseData {
    offsets: Vec<usize>,
    items: Vec<usize>,
    categories: Vec<usize>,
    groups: Vec<usize>,
    n_items: usize,
    n_groups: usize,
}

impl ResponseData {
    /// Construct a validated store from flat arrays.
    ///
    /// Parameters
    /// ----------
    /// - `offsets`: `Vec<usize>`
    ///   Person `p` owns responses `offsets[p]..offsets[p + 1]`.
    /// - `items`, `categories`: `Vec<usize>`
    ///   Item index and observed category per response.
    /// - `groups`: `Vec<usize>`
    ///   Group label per person.
    /// - `n_items`, `n_groups`: number of items and groups.
    ///
    /// Errors
    /// ------
    /// - `IrtError::LengthMismatch` for inconsistent array lengths.
    /// - `IrtError::PersonRangeInvalid` for malformed offsets.
    /// - `IrtError::ItemIndexOutOfRange` / `IrtError::GroupOutOfRange` for
    ///   out-of-range indices.
    /// - `IrtError::EmptyGroup` when a group has no persons.
    pub fn new(
        offsets: Vec<usize>, items: Vec<usize>, categories: Vec<usize>, groups: Vec<usize>,
        n_items: usize, n_groups: usize,
    ) -> IrtResult<Self> {
        if items.len() != categories.len() {
            return Err(IrtError::LengthMismatch {
                what: "response categories",
                expected: items.len(),
                found: categories.len(),
            });
        }
        if offsets.len() != groups.len() + 1 {
            return Err(IrtError::LengthMismatch {
                what: "person offsets",
                expected: groups.len() + 1,
                found: offsets.len(),
            });
        }
        if offsets[0] != 0 {
            return Err(IrtError::PersonRangeInvalid {
                person: 0,
                reason: "First offset must be zero.",
            });
        }
        for (person, w) in offsets.windows(2).enumerate() {
            if w[1] < w[0] {
                return Err(IrtError::PersonRangeInvalid {
                    person,
                    reason: "Offsets must be non-decreasing.",
                });
            }
        }
        if offsets[groups.len()] != items.len() {
            return Err(IrtError::PersonRangeInvalid {
                person: groups.len().saturating_sub(1),
                reason: "Last offset must equal the number of responses.",
            });
        }
        if let Some((response, &item)) = items.iter().enumerate().find(|(_, i)| **i >= n_items) {
            return Err(IrtError::ItemIndexOutOfRange { response, item, n_items });
        }
        let mut sizes = vec![0usize; n_groups];
        for (person, &group) in groups.iter().enumerate() {
            if group >= n_groups {
                return Err(IrtError::GroupOutOfRange { person, group, n_groups });
            }
            sizes[group] += 1;
        }
        if let Some(group) = sizes.iter().position(|&n| n == 0) {
            return Err(IrtError::EmptyGroup { group });
        }
        Ok(Self { offsets, items, categories, groups, n_items, n_groups })
    }

    /// Construct from one `(group, responses)` entry per person.
    ///
    /// # Errors
    /// Same as [`ResponseData::new`].
    pub fn from_persons(
        persons: &[(usize, Vec<(usize, usize)>)], n_items: usize, n_groups: usize,
    ) -> IrtResult<Self> {
        let mut offsets = Vec::with_capacity(persons.len() + 1);
        let mut items = Vec::new();
        let mut categories = Vec::new();
        let mut groups = Vec::with_capacity(persons.len());
        offsets.push(0);
        for (group, responses) in persons {
            for &(item, category) in responses {
                items.push(item);
                categories.push(category);
            }
            offsets.push(items.len());
            groups.push(*group);
        }
        Self::new(offsets, items, categories, groups, n_items, n_groups)
    }

    /// Check every observed category against `n_categories(item)`.
    ///
    /// # Errors
    /// - `IrtError::CategoryOutOfRange` for the first offending response.
    pub fn validate_categories<F>(&self, n_categories: F) -> IrtResult<()>
    where
        F: Fn(usize) -> usize,
    {
        for (response, (&item, &category)) in self.items.iter().zip(&self.categories).enumerate()
        {
            let k = n_categories(item);
            if category >= k {
                return Err(IrtError::CategoryOutOfRange {
                    response,
                    item,
                    category,
                    n_categories: k,
                });
            }
        }
        Ok(())
    }

    pub fn n_persons(&self) -> usize {
        self.groups.len()
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    pub fn n_responses(&self) -> usize {
        self.items.len()
    }

    /// Item indices and categories answered by `person`.
    pub fn responses(&self, person: usize) -> (&[usize], &[usize]) {
        let range = self.offsets[person]..self.offsets[person + 1];
        (&self.items[range.clone()], &self.categories[range])
    }

    pub fn group_of(&self, person: usize) -> usize {
        self.groups[person]
    }

    /// Number of persons per group.
    pub fn group_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.n_groups];
        for &g in &self.groups {
            sizes[g] += 1;
        }
        sizes
    }
}
