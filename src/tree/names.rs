//! Feature names and slash-separated paths.
//!
//! Names are case-preserving for display and case-insensitive for lookup
//! and ordering.

use std::cmp::Ordering;

use super::FeatureTree;
use crate::error::TreeError;
use crate::models::FeatureId;

/// A legal name is non-empty and made of ASCII letters, digits and `_`.
pub fn is_legal_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split `path` into its segments, validating each one.
///
/// A single trailing `/` is tolerated. On failure the error names the
/// offending segment, which may be empty (`"a//b"`, `"/a"`, `""`).
pub fn parse_path(path: &str) -> Result<Vec<String>, TreeError> {
    let body = path.strip_suffix('/').unwrap_or(path);
    let mut segments = Vec::new();
    for segment in body.split('/') {
        if !is_legal_name(segment) {
            return Err(TreeError::IllegalFeaturePath {
                path: path.to_string(),
                segment: segment.to_string(),
            });
        }
        segments.push(segment.to_string());
    }
    Ok(segments)
}

pub fn is_legal_path(path: &str) -> bool {
    parse_path(path).is_ok()
}

/// Three-way comparison ignoring ASCII case. A proper prefix orders first.
pub fn case_insensitive_compare(key: &str, test: &str) -> Ordering {
    key.bytes()
        .map(|b| b.to_ascii_lowercase())
        .cmp(test.bytes().map(|b| b.to_ascii_lowercase()))
}

impl FeatureTree {
    /// Position of the first direct subfeature of `parent` named `name`.
    pub fn find_subfeature_index(
        &self,
        parent: FeatureId,
        name: &str,
    ) -> Result<Option<usize>, TreeError> {
        let node = self.feature(parent)?;
        for (ix, child) in node.subfeatures.iter().enumerate() {
            if case_insensitive_compare(name, self.name(*child)?) == Ordering::Equal {
                return Ok(Some(ix));
            }
        }
        Ok(None)
    }

    pub fn find_subfeature(
        &self,
        parent: FeatureId,
        name: &str,
    ) -> Result<Option<FeatureId>, TreeError> {
        let node = self.feature(parent)?;
        Ok(self
            .find_subfeature_index(parent, name)?
            .map(|ix| node.subfeatures[ix]))
    }

    /// Walk `path` downward from `start`, one direct-child lookup per segment.
    pub fn find_by_path(&self, start: FeatureId, path: &str) -> Result<Option<FeatureId>, TreeError> {
        let mut current = start;
        for segment in parse_path(path)? {
            match self.find_subfeature(current, &segment)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Root-to-`id` names joined by `/`.
    pub fn full_name(&self, id: FeatureId) -> Result<String, TreeError> {
        let mut names = Vec::new();
        for ancestor in self.path_to_root(id)? {
            names.push(self.name(ancestor)?);
        }
        names.reverse();
        Ok(names.join("/"))
    }
}
