//! Dimension names and dimension-value combinations
//!
//! A [`DimensionValues`] is the coordinate of one cube node: the values taken
//! by the first `n` explored dimensions, in the order fixed by [`Dimensions`].
//! The empty vector is the root, i.e. the overall total.

use crate::{RcaError, RcaResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

// ── DimensionValues ──────────────────────────────────────────────────

/// Ordered vector of dimension values identifying one combination
///
/// Ordering puts longer (more specific) vectors first; vectors of equal
/// length compare element by element. Sorting a set of combinations with
/// this order therefore visits every node before any of its ancestors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Option<Vec<String>>", into = "Vec<String>")]
pub struct DimensionValues(Vec<String>);

impl DimensionValues {
    /// Create a combination from its values
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// The empty combination, i.e. the overall total
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Depth of the node this combination identifies (root is level 0)
    pub fn level(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Most specific value, if any
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The first `depth` values (the whole combination if shorter)
    pub fn prefix(&self, depth: usize) -> Self {
        Self(self.0[..depth.min(self.0.len())].to_vec())
    }

    /// Combination with the most specific constraint dropped; `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.prefix(self.0.len() - 1))
        }
    }

    /// Extend this combination with one more value
    pub fn child(&self, value: impl Into<String>) -> Self {
        let mut values = self.0.clone();
        values.push(value.into());
        Self(values)
    }

    /// True when `other` is exactly one level below this combination
    pub fn is_parent_of(&self, other: &DimensionValues) -> bool {
        other.0.len() == self.0.len() + 1 && other.0.starts_with(&self.0)
    }

    /// True when `other` is strictly below this combination
    pub fn is_ancestor_of(&self, other: &DimensionValues) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Ord for DimensionValues {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .len()
            .cmp(&self.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for DimensionValues {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<Option<Vec<String>>> for DimensionValues {
    type Error = RcaError;

    fn try_from(values: Option<Vec<String>>) -> RcaResult<Self> {
        values.map(Self).ok_or_else(|| {
            RcaError::InvalidArgument("dimension values must not be null".to_string())
        })
    }
}

impl From<Vec<String>> for DimensionValues {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl From<DimensionValues> for Vec<String> {
    fn from(values: DimensionValues) -> Self {
        values.0
    }
}

impl std::fmt::Display for DimensionValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "(root)")
        } else {
            write!(f, "{}", self.0.join("/"))
        }
    }
}

// ── Dimensions ───────────────────────────────────────────────────────

/// Ordered, unique dimension names
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Dimensions(Vec<String>);

impl Dimensions {
    /// Create a dimension list, rejecting blank or repeated names
    pub fn new<I, S>(names: I) -> RcaResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for name in &names {
            if name.trim().is_empty() {
                return Err(RcaError::InvalidArgument(
                    "dimension name must not be blank".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(RcaError::InvalidArgument(format!(
                    "duplicate dimension name '{}'",
                    name
                )));
            }
        }
        Ok(Self(names))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    /// Names of the first `depth` dimensions
    pub fn names_to_depth(&self, depth: usize) -> &[String] {
        &self.0[..depth.min(self.0.len())]
    }

    /// Keep only the first `depth` dimensions
    pub fn truncated(&self, depth: usize) -> Self {
        Self(self.names_to_depth(depth).to_vec())
    }

    /// Drop every dimension named in `excluded`, keeping the order of the rest
    pub fn without(&self, excluded: &[String]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|name| !excluded.contains(name))
                .cloned()
                .collect(),
        )
    }

    /// True when this list is a strict prefix of `other`
    pub fn is_parent_of(&self, other: &Dimensions) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for Dimensions {
    type Error = RcaError;

    fn try_from(names: Vec<String>) -> RcaResult<Self> {
        Self::new(names)
    }
}

impl From<Dimensions> for Vec<String> {
    fn from(dimensions: Dimensions) -> Self {
        dimensions.0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}
