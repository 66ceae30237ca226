use std::fmt;

use indexmap::IndexMap;

use crate::error::AsmError;

pub const MAX_LABELS: usize = 16;
pub const MAX_FORWARD_REFS: usize = 16;
pub const LABEL_LEN: usize = 3;

/// A label identifier: up to three characters, upper-cased and space padded.
/// Longer identifiers are cut to their first three characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelName([u8; LABEL_LEN]);

impl LabelName {
    /// `None` unless `text` is a letter followed by letters or digits.
    pub fn parse(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        if !chars.all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }

        let mut name = [b' '; LABEL_LEN];
        for (slot, byte) in name.iter_mut().zip(text.bytes()) {
            *slot = byte.to_ascii_uppercase();
        }
        if text.len() > LABEL_LEN {
            tracing::debug!(label = text, "label truncated to {} characters", LABEL_LEN);
        }
        Some(Self(name))
    }

    pub fn as_str(&self) -> &str {
        // only ever built from ASCII
        std::str::from_utf8(&self.0).unwrap_or("???").trim_end()
    }
}

impl fmt::Display for LabelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    /// Set once, when the definition is assembled.
    pub address: Option<u8>,
    /// RAM addresses waiting for this label's address.
    pub fixups: Vec<u8>,
}

/// Labels of one assembly pass, in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: IndexMap<LabelName, Label>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, name: &LabelName) -> Option<&Label> {
        self.labels.get(name)
    }

    pub fn address(&self, name: &LabelName) -> Option<u8> {
        self.labels.get(name).and_then(|label| label.address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LabelName, &Label)> {
        self.labels.iter()
    }

    /// Labels referenced but never defined.
    pub fn undefined(&self) -> Vec<LabelName> {
        self.labels
            .iter()
            .filter(|(_, label)| label.address.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Check that `name` can be defined. Returns whether it needs a new slot.
    pub fn check_define(&self, name: &LabelName) -> Result<bool, AsmError> {
        match self.labels.get(name) {
            Some(label) if label.address.is_some() => Err(AsmError::DuplicateLabel(*name)),
            Some(_) => Ok(false),
            None if self.labels.len() >= MAX_LABELS => Err(AsmError::LabelTableFull),
            None => Ok(true),
        }
    }

    /// Check that a forward reference to `name` at `site` can be recorded,
    /// given `reserved` slots already promised to the same statement. A
    /// fixup already pending at `site` is about to be overwritten and does not
    /// count.
    pub fn check_forward_ref(
        &self,
        name: &LabelName,
        reserved: usize,
        site: u8,
    ) -> Result<(), AsmError> {
        match self.labels.get(name) {
            Some(label)
                if label.fixups.iter().filter(|&&s| s != site).count() >= MAX_FORWARD_REFS =>
            {
                Err(AsmError::TooManyForwardRefs(*name))
            }
            Some(_) => Ok(()),
            None if self.labels.len() + reserved >= MAX_LABELS => Err(AsmError::LabelTableFull),
            None => Ok(()),
        }
    }

    /// Define `name` at `address`, handing back the patch sites recorded for
    /// it so far. The label keeps no fixups afterwards.
    pub fn define(&mut self, name: LabelName, address: u8) -> Result<Vec<u8>, AsmError> {
        self.check_define(&name)?;
        let label = self.labels.entry(name).or_default();
        label.address = Some(address);
        Ok(std::mem::take(&mut label.fixups))
    }

    pub fn add_forward_ref(&mut self, name: LabelName, site: u8) -> Result<(), AsmError> {
        self.check_forward_ref(&name, 0, site)?;
        self.release_site(site);
        self.labels.entry(name).or_default().fixups.push(site);
        Ok(())
    }

    /// Drop every pending fixup at `site`. Called whenever the byte at `site`
    /// is rewritten, so a patch never merges into a byte it did not place.
    pub fn release_site(&mut self, site: u8) {
        for label in self.labels.values_mut() {
            label.fixups.retain(|&s| s != site);
        }
    }
}
