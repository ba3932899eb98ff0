//! Chain order
//!
//! The user-chosen sequence of effect kinds. Each kind appears at most once.

use serde::{Deserialize, Serialize};

use crate::catalog::{CATALOG, EffectDescriptor, EffectKind};
use crate::error::{RackError, RackResult};

/// Ordered, duplicate-free list of effect kinds
///
/// Serialized as a list of ids. Ids that are unknown to the current catalog
/// are dropped when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<String>", from = "Vec<String>")]
pub struct ChainOrder(Vec<EffectKind>);

impl Default for ChainOrder {
    fn default() -> Self {
        Self(EffectKind::ALL.to_vec())
    }
}

impl ChainOrder {
    pub fn new(kinds: Vec<EffectKind>) -> RackResult<Self> {
        for (i, kind) in kinds.iter().enumerate() {
            if kinds[..i].contains(kind) {
                return Err(RackError::DuplicateEffect(kind.id().to_string()));
            }
        }
        Ok(Self(kinds))
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Resolve ids against the built-in catalog, dropping unknown and repeated ids
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_ids_in(ids, &CATALOG)
    }

    /// Resolve ids against `catalog`
    pub fn from_ids_in<I, S>(ids: I, catalog: &[EffectDescriptor]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kinds = Vec::new();
        for id in ids {
            let id = id.as_ref();
            match catalog.iter().find(|d| d.id() == id) {
                Some(desc) if !kinds.contains(&desc.kind) => kinds.push(desc.kind),
                Some(_) => log::debug!("Dropping repeated chain entry '{id}'"),
                None => log::warn!("Dropping unknown effect '{id}' from chain order"),
            }
        }
        Self(kinds)
    }

    #[inline]
    pub fn kinds(&self) -> &[EffectKind] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = EffectKind> + '_ {
        self.0.iter().copied()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.0.iter().map(|k| k.id()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, kind: EffectKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn position(&self, kind: EffectKind) -> Option<usize> {
        self.0.iter().position(|&k| k == kind)
    }

    /// Move the unit at `from` so it ends up at index `to`
    pub fn move_unit(&mut self, from: usize, to: usize) -> RackResult<()> {
        let len = self.0.len();
        for position in [from, to] {
            if position >= len {
                return Err(RackError::InvalidPosition { position, len });
            }
        }
        let kind = self.0.remove(from);
        self.0.insert(to, kind);
        Ok(())
    }
}

impl From<Vec<String>> for ChainOrder {
    fn from(ids: Vec<String>) -> Self {
        Self::from_ids(ids)
    }
}

impl From<ChainOrder> for Vec<String> {
    fn from(order: ChainOrder) -> Self {
        order.0.iter().map(|k| k.id().to_string()).collect()
    }
}

impl std::fmt::Display for ChainOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(empty)");
        }
        for (i, kind) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(kind.id())?;
        }
        Ok(())
    }
}
