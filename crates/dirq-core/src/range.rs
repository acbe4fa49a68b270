//! Range retrieval specifiers (`attribute;range=low-high`).
//!
//! Servers deliver large multi-valued attributes in windows. The first
//! response carries e.g. `member;range=0-1499`, the client asks for the next
//! window by name, and the final window is marked with `*` as its upper
//! bound: `member;range=3000-*`.

use std::fmt;

use crate::entry::DirectoryEntry;
use crate::error::{DirectoryError, DirectoryResult};

const RANGE_MARKER: &str = ";range=";

/// Cursor over the windows of one range-limited attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeCursor {
    /// Attribute name without the range option.
    pub attribute: String,
    /// First value index in this window.
    pub low: u32,
    /// Last value index in this window; `None` for `*` (final window).
    pub high: Option<u32>,
}

impl RangeCursor {
    /// Parses `name;range=low-high` or `name;range=low-*`.
    ///
    /// ## Errors
    ///
    /// Returns [`DirectoryError::InvalidRange`] when the name carries no range
    /// option or the bounds are not numeric or are inverted.
    pub fn parse(specifier: &str) -> DirectoryResult<Self> {
        let invalid = || DirectoryError::InvalidRange(specifier.to_string());

        let marker = find_marker(specifier).ok_or_else(invalid)?;
        let attribute = &specifier[..marker];
        let bounds = &specifier[marker + RANGE_MARKER.len()..];
        if attribute.is_empty() {
            return Err(invalid());
        }

        let (low, high) = bounds.split_once('-').ok_or_else(invalid)?;
        let low: u32 = low.parse().map_err(|_| invalid())?;
        let high = match high {
            "*" => None,
            value => {
                let high: u32 = value.parse().map_err(|_| invalid())?;
                if high < low {
                    return Err(invalid());
                }
                Some(high)
            }
        };

        Ok(Self {
            attribute: attribute.to_string(),
            low,
            high,
        })
    }

    /// Whether `name` carries a range option.
    #[must_use]
    pub fn is_range_attribute(name: &str) -> bool {
        find_marker(name).is_some()
    }

    /// Whether this is the final window.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.high.is_none()
    }

    /// Computes the next window.
    ///
    /// The next window starts right after this one and ends at
    /// `high + (high - low) + 1`, one further when this window started at
    /// zero. Returns `None` for the final window, and for a window whose
    /// bounds are equal, which would otherwise be re-requested forever.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        let high = self.high?;
        if high == self.low {
            return None;
        }

        let width = high - self.low;
        let adjustment = u32::from(self.low == 0);
        let next_low = high.checked_add(1)?;
        let next_high = high
            .checked_add(width)?
            .checked_add(1)?
            .checked_add(adjustment)?;

        Some(Self {
            attribute: self.attribute.clone(),
            low: next_low,
            high: Some(next_high),
        })
    }

    /// Whether `name` is this cursor's attribute (with or without a range
    /// option).
    #[must_use]
    pub fn matches_attribute(&self, name: &str) -> bool {
        let base = find_marker(name).map_or(name, |marker| &name[..marker]);
        base.eq_ignore_ascii_case(&self.attribute)
    }
}

impl fmt::Display for RangeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.high {
            Some(high) => write!(f, "{}{RANGE_MARKER}{}-{high}", self.attribute, self.low),
            None => write!(f, "{}{RANGE_MARKER}{}-*", self.attribute, self.low),
        }
    }
}

/// Whether any attribute of the entry is range-limited.
#[must_use]
pub fn has_range_attributes(entry: &DirectoryEntry) -> bool {
    entry
        .attributes
        .keys()
        .any(|name| RangeCursor::is_range_attribute(name))
}

/// Parses every range-limited attribute name of the entry.
///
/// Names that carry a range option but do not parse are skipped.
#[must_use]
pub fn range_cursors(entry: &DirectoryEntry) -> Vec<(String, RangeCursor)> {
    entry
        .attributes
        .keys()
        .filter(|name| RangeCursor::is_range_attribute(name))
        .filter_map(|name| {
            RangeCursor::parse(name)
                .ok()
                .map(|cursor| (name.clone(), cursor))
        })
        .collect()
}

fn find_marker(name: &str) -> Option<usize> {
    name.to_ascii_lowercase().find(RANGE_MARKER)
}
