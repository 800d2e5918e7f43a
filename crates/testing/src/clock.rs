use std::collections::BTreeMap;
use std::fmt;

/// A Clock is a mapping from journal name to a byte offset within that
/// journal. It's used uniformly for ingest write offsets, task read-through
/// progress, and per-shard write-progress responses.
///
/// `BTreeMap` is used (rather than a hash map) so that iteration order is
/// stable across runs, which keeps log output and snapshot tests
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Clock(BTreeMap<String, i64>);

impl Clock {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, journal: &str) -> i64 {
        self.0.get(journal).copied().unwrap_or(0)
    }

    pub fn set(&mut self, journal: impl Into<String>, offset: i64) {
        self.0.insert(journal.into(), offset);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(j, o)| (j.as_str(), *o))
    }

    /// Deep copy of this clock. `Clock` is cheap to `Clone` directly;
    /// this exists to name the operation spec.md's vector-clock algebra
    /// calls out explicitly.
    pub fn copy(&self) -> Clock {
        self.clone()
    }

    /// Returns a new clock whose keys are the union of `self` and `other`,
    /// keeping the pointwise minimum offset for keys present in both, and
    /// the present operand's offset for keys present in only one — a
    /// missing key is "unconstrained", not zero, for `min`.
    pub fn min(&self, other: &Clock) -> Clock {
        merge(self, other, std::cmp::min)
    }

    /// Dual of `min`: pointwise maximum, with a missing key in one operand
    /// treated as offset zero so the other operand's offset always wins.
    pub fn max(&self, other: &Clock) -> Clock {
        merge(self, other, std::cmp::max)
    }

    pub fn merge_max(&mut self, other: &Clock) {
        *self = self.max(other);
    }

    /// True iff for every `(journal, offset)` in `other`, `self[journal] >=
    /// offset`. Journals absent from `self` are treated as offset zero.
    pub fn contains(&self, other: &Clock) -> bool {
        other.0.iter().all(|(j, o)| self.get(j) >= *o)
    }
}

fn merge(lhs: &Clock, rhs: &Clock, pick: impl Fn(i64, i64) -> i64) -> Clock {
    let mut out = lhs.0.clone();
    for (journal, rhs_offset) in rhs.0.iter() {
        out.entry(journal.clone())
            .and_modify(|lhs_offset| *lhs_offset = pick(*lhs_offset, *rhs_offset))
            .or_insert(*rhs_offset);
    }
    Clock(out)
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (journal, offset)) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{journal}: {offset}")?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, i64)> for Clock {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
