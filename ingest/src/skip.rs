//! Row and column skip specifications.
//!
//! Rows are skipped either by count (the first N) or by index. Negative
//! indices count from the end, so resolving them needs the total number of
//! rows; [`RowSkip::needs_total`] tells the caller whether that pre-pass is
//! required. Columns are skipped by index or by header name, with a
//! case-insensitive fallback when no exact name matches.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IngestError, Result};

/// Which raw rows to leave out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowSkip {
    /// Skip the first N rows.
    Count(usize),
    /// Skip these 0-based indices; negative values count from the end.
    Indices(BTreeSet<i64>),
}

impl Default for RowSkip {
    fn default() -> Self {
        Self::Count(0)
    }
}

impl RowSkip {
    /// Returns `true` when resolution needs the total row count.
    pub fn needs_total(&self) -> bool {
        matches!(self, Self::Indices(indices) if indices.iter().any(|&i| i < 0))
    }

    /// Resolves the skip into a concrete exclusion.
    ///
    /// `total` is only consulted when [`needs_total`](Self::needs_total) is
    /// true. Indices that fall outside `0..total` once resolved are ignored
    /// with a warning.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use sdif_ingest::RowSkip;
    ///
    /// let last = RowSkip::Indices(BTreeSet::from([-1]));
    /// assert!(last.needs_total());
    /// let exclusion = last.resolve(Some(10)).unwrap();
    /// assert!(exclusion.excludes(9));
    /// assert!(!exclusion.excludes(8));
    ///
    /// let first_three = RowSkip::Count(3).resolve(None).unwrap();
    /// assert!(first_three.excludes(2));
    /// assert!(!first_three.excludes(3));
    /// ```
    pub fn resolve(&self, total: Option<usize>) -> Result<RowExclusion> {
        let indices = match self {
            Self::Count(count) => return Ok(RowExclusion::First(*count)),
            Self::Indices(indices) => indices,
        };

        if !self.needs_total() {
            let resolved = indices.iter().filter_map(|&i| usize::try_from(i).ok()).collect();
            return Ok(RowExclusion::Indices(resolved));
        }

        let total = total.ok_or_else(|| {
            IngestError::InvalidSkipSpec(
                "negative row indices need the total row count".to_string(),
            )
        })?;
        let total_i = i64::try_from(total).unwrap_or(i64::MAX);
        let mut resolved = HashSet::new();
        for &index in indices {
            let absolute = if index < 0 { total_i + index } else { index };
            if (0..total_i).contains(&absolute) {
                resolved.insert(absolute as usize);
            } else {
                warn!(index, total, "Row skip index out of range, ignoring");
            }
        }
        debug!(?indices, ?resolved, total, "Resolved row skip indices");
        Ok(RowExclusion::Indices(resolved))
    }
}

/// A resolved row-skip predicate over 0-based raw row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowExclusion {
    First(usize),
    Indices(HashSet<usize>),
}

impl RowExclusion {
    pub fn excludes(&self, index: usize) -> bool {
        match self {
            Self::First(count) => index < *count,
            Self::Indices(indices) => indices.contains(&index),
        }
    }
}

/// A column picked by position or by header name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(i64),
    Name(String),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Resolves column skips against the raw header into 0-based indices.
///
/// `headers` is `None` for headerless input, in which case names cannot be
/// used. `width` is the number of raw columns.
///
/// # Errors
///
/// - [`IngestError::InvalidSkipSpec`] for names without a header, negative
///   indices, or indices past the last column
/// - [`IngestError::ColumnNotFound`] for a name that matches no header,
///   even case-insensitively
pub fn resolve_column_skips(
    skips: &[ColumnRef],
    headers: Option<&[String]>,
    width: usize,
) -> Result<BTreeSet<usize>> {
    let mut resolved = BTreeSet::new();
    for skip in skips {
        let index = match skip {
            ColumnRef::Index(index) => usize::try_from(*index).map_err(|_| {
                IngestError::InvalidSkipSpec(format!(
                    "negative column index {index} is not supported"
                ))
            })?,
            ColumnRef::Name(name) => {
                let headers = headers.ok_or_else(|| {
                    IngestError::InvalidSkipSpec(format!(
                        "cannot skip column '{name}' by name without a header row"
                    ))
                })?;
                resolve_name(name, headers)?
            }
        };
        if index >= width {
            return Err(IngestError::InvalidSkipSpec(format!(
                "column index {index} out of range for {width} columns"
            )));
        }
        resolved.insert(index);
    }
    Ok(resolved)
}

fn resolve_name(name: &str, headers: &[String]) -> Result<usize> {
    if let Some(index) = headers.iter().position(|h| h == name) {
        return Ok(index);
    }
    let lower = name.to_lowercase();
    if let Some(index) = headers.iter().position(|h| h.to_lowercase() == lower) {
        warn!(
            requested = name,
            matched = %headers[index],
            "Resolved skipped column case-insensitively"
        );
        return Ok(index);
    }
    Err(IngestError::ColumnNotFound {
        name: name.to_string(),
        available: headers.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        vec!["Id".into(), "Name".into(), "Notes".into()]
    }

    #[test]
    fn test_non_negative_indices_need_no_total() {
        let skip = RowSkip::Indices(BTreeSet::from([0, 4]));
        assert!(!skip.needs_total());
        let exclusion = skip.resolve(None).unwrap();
        assert!(exclusion.excludes(4));
        assert!(!exclusion.excludes(1));
        assert!(!RowSkip::Count(3).needs_total());
    }

    #[test]
    fn test_negative_indices_without_total_fail() {
        let skip = RowSkip::Indices(BTreeSet::from([-2]));
        assert!(matches!(skip.resolve(None), Err(IngestError::InvalidSkipSpec(_))));
    }

    #[test]
    fn test_out_of_range_indices_ignored() {
        let skip = RowSkip::Indices(BTreeSet::from([-20, -1, 30]));
        let exclusion = skip.resolve(Some(10)).unwrap();
        assert_eq!(exclusion, RowExclusion::Indices(HashSet::from([9])));
    }

    #[test]
    fn test_row_skip_yaml_forms() {
        let count: RowSkip = serde_yaml::from_str("2").unwrap();
        assert_eq!(count, RowSkip::Count(2));
        let indices: RowSkip = serde_yaml::from_str("[0, -1]").unwrap();
        assert_eq!(indices, RowSkip::Indices(BTreeSet::from([-1, 0])));
    }

    #[test]
    fn test_column_names_and_indices() {
        let h = headers();
        let skips = [ColumnRef::Name("Notes".into()), ColumnRef::Index(0)];
        let resolved = resolve_column_skips(&skips, Some(&h), 3).unwrap();
        assert_eq!(resolved, BTreeSet::from([0, 2]));
    }

    #[test]
    fn test_column_name_case_fallback() {
        let h = headers();
        let resolved = resolve_column_skips(&[ColumnRef::Name("notes".into())], Some(&h), 3).unwrap();
        assert_eq!(resolved, BTreeSet::from([2]));
    }

    #[test]
    fn test_column_skip_errors() {
        let h = headers();
        assert!(matches!(
            resolve_column_skips(&[ColumnRef::Name("missing".into())], Some(&h), 3),
            Err(IngestError::ColumnNotFound { .. })
        ));
        assert!(matches!(
            resolve_column_skips(&[ColumnRef::Name("Id".into())], None, 3),
            Err(IngestError::InvalidSkipSpec(_))
        ));
        assert!(matches!(
            resolve_column_skips(&[ColumnRef::Index(-1)], Some(&h), 3),
            Err(IngestError::InvalidSkipSpec(_))
        ));
        assert!(matches!(
            resolve_column_skips(&[ColumnRef::Index(3)], Some(&h), 3),
            Err(IngestError::InvalidSkipSpec(_))
        ));
    }
}
