//! Bid-to-deployment subject mapping.
//!
//! The mapping is maintained by hand as a markdown table:
//!
//! ```text
//! | Bid Icon Subject | Deployment Icon Subject | Category |
//! |------------------|-------------------------|----------|
//! | AP_Bid           | AP - Cisco MR36H        | Wireless |
//! ```
//!
//! [`SubjectMapping`] parses that table once; [`SubjectResolver`] wraps it
//! together with the legend markers and answers per-annotation queries.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// One row of the mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Subject used on bid drawings
    pub bid_subject: String,
    /// Subject of the replacement deployment icon
    pub deployment_subject: String,
    /// Equipment category
    pub category: String,
}

/// Ordered bid → deployment subject table.
#[derive(Debug, Clone, Default)]
pub struct SubjectMapping {
    entries: Vec<MappingEntry>,
    index: HashMap<String, usize>,
}

fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

impl SubjectMapping {
    /// Parse the first markdown table with at least three columns.
    ///
    /// Rows with fewer than three cells are ignored. A bid subject may only
    /// appear once.
    pub fn parse_markdown(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();

        let header = lines
            .iter()
            .position(|line| line.trim_start().starts_with('|') && split_row(line).len() >= 3)
            .ok_or_else(|| Error::Mapping("No markdown table found".to_string()))?;

        let mut mapping = Self::default();
        for line in &lines[header + 1..] {
            if !line.trim_start().starts_with('|') {
                break;
            }
            let cells = split_row(line);
            if is_separator_row(&cells) || cells.len() < 3 {
                continue;
            }
            let entry = MappingEntry {
                bid_subject: cells[0].clone(),
                deployment_subject: cells[1].clone(),
                category: cells[2].clone(),
            };
            if mapping.index.contains_key(&entry.bid_subject) {
                return Err(Error::Mapping(format!("Duplicate bid subject: {}", entry.bid_subject)));
            }
            mapping.index.insert(entry.bid_subject.clone(), mapping.entries.len());
            mapping.entries.push(entry);
        }

        if mapping.entries.is_empty() {
            return Err(Error::Mapping("No mapping data found".to_string()));
        }

        log::debug!("Parsed {} subject mappings", mapping.entries.len());
        Ok(mapping)
    }

    /// Read and parse a markdown file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mapping = Self::parse_markdown(&text)?;
        log::info!("Loaded {} mappings from {}", mapping.len(), path.as_ref().display());
        Ok(mapping)
    }

    /// Build a mapping from `(bid, deployment, category)` triples.
    ///
    /// Later duplicates replace earlier ones.
    pub fn from_entries<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        let mut mapping = Self::default();
        for (bid, deployment, category) in rows {
            let entry = MappingEntry {
                bid_subject: bid.into(),
                deployment_subject: deployment.into(),
                category: category.into(),
            };
            match mapping.index.get(&entry.bid_subject) {
                Some(&i) => mapping.entries[i] = entry,
                None => {
                    mapping.index.insert(entry.bid_subject.clone(), mapping.entries.len());
                    mapping.entries.push(entry);
                },
            }
        }
        mapping
    }

    /// Deployment subject for a bid subject (exact, case-sensitive).
    pub fn get_deployment_subject(&self, bid_subject: &str) -> Option<&str> {
        self.entry(bid_subject).map(|e| e.deployment_subject.as_str())
    }

    /// Category for a bid subject.
    pub fn get_category(&self, bid_subject: &str) -> Option<&str> {
        self.entry(bid_subject).map(|e| e.category.as_str())
    }

    /// Full row for a bid subject.
    pub fn entry(&self, bid_subject: &str) -> Option<&MappingEntry> {
        self.index.get(bid_subject).map(|&i| &self.entries[i])
    }

    /// Bid subjects in table order.
    pub fn bid_subjects(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.bid_subject.as_str()).collect()
    }

    /// Distinct deployment subjects in table order.
    pub fn deployment_subjects(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .map(|e| e.deployment_subject.as_str())
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// All rows in table order.
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no rows are loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the table for empty cells.
    ///
    /// Returns whether the table is usable plus one message per problem.
    pub fn validate(&self) -> (bool, Vec<String>) {
        if self.entries.is_empty() {
            return (false, vec!["No mappings loaded".to_string()]);
        }

        let mut errors = Vec::new();
        for (row, entry) in self.entries.iter().enumerate() {
            if entry.bid_subject.is_empty() {
                errors.push(format!("Row {}: empty bid subject", row + 1));
            }
            if entry.deployment_subject.is_empty() {
                errors.push(format!("Row {}: empty deployment subject for '{}'", row + 1, entry.bid_subject));
            }
            if entry.category.is_empty() {
                errors.push(format!("Row {}: empty category for '{}'", row + 1, entry.bid_subject));
            }
        }
        (errors.is_empty(), errors)
    }
}

/// Outcome of resolving one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Replace with the given deployment subject
    Convert(String),
    /// Remove (legend and header markups)
    Delete,
    /// Not in the table; leave the annotation alone
    Unmapped,
}

/// Default substrings marking legend and header markups.
pub const DEFAULT_LEGEND_MARKERS: [&str; 4] = ["Legend", "LEGEND", "Header", "HEADER"];

/// Read-only subject resolver shared by every conversion of a process.
#[derive(Debug, Clone)]
pub struct SubjectResolver {
    mapping: SubjectMapping,
    legend_markers: Vec<String>,
}

impl SubjectResolver {
    /// Create a resolver with the default legend markers.
    pub fn new(mapping: SubjectMapping) -> Self {
        Self {
            mapping,
            legend_markers: DEFAULT_LEGEND_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the legend markers.
    pub fn with_legend_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.legend_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// The wrapped mapping table.
    pub fn mapping(&self) -> &SubjectMapping {
        &self.mapping
    }

    /// True when `subject` contains a legend or header marker.
    pub fn is_legend(&self, subject: &str) -> bool {
        self.legend_markers
            .iter()
            .any(|m| !m.is_empty() && subject.contains(m.as_str()))
    }

    /// Classify a decoded subject. Markers are checked before the table.
    pub fn resolve(&self, subject: &str) -> Resolution {
        if self.is_legend(subject) {
            return Resolution::Delete;
        }
        match self.mapping.get_deployment_subject(subject) {
            Some(target) => Resolution::Convert(target.to_string()),
            None => Resolution::Unmapped,
        }
    }
}
