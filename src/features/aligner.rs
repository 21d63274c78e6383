//! One-hot encoding of a normalized record, reindexed onto the reference
//! schema.

use super::normalizer::NormalizedRecord;
use super::one_hot_column;
use super::schema::ReferenceSchema;
use crate::error::{ServiceError, ServiceResult};
use std::sync::Arc;
use tracing::debug;

/// One numeric row whose columns are exactly the reference schema, in
/// schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFeatures {
    schema: Arc<ReferenceSchema>,
    values: Vec<f32>,
}

impl AlignedFeatures {
    /// Schema the row was aligned to
    pub fn schema(&self) -> &Arc<ReferenceSchema> {
        &self.schema
    }

    /// Column names in model order
    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    /// Feature values in model order
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no features
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named column
    pub fn get(&self, column: &str) -> Option<f32> {
        self.schema.position(column).map(|i| self.values[i])
    }

    /// `(column, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.columns()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Columns set to 1
    pub fn active_columns(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, value)| *value != 0.0)
            .map(|(column, _)| column)
            .collect()
    }
}

/// Encodes a [`NormalizedRecord`] with the same rules the schema builder
/// used and aligns the result onto the schema.
pub struct FeatureAligner;

impl FeatureAligner {
    /// Create an aligner
    pub fn new() -> Self {
        Self
    }

    /// One-hot columns produced by the record alone, before alignment
    pub fn encode(&self, record: &NormalizedRecord) -> Vec<String> {
        record
            .categorical()
            .map(|(field, value)| one_hot_column(field, value))
            .collect()
    }

    /// Align a record onto the current schema.
    ///
    /// Schema columns the record does not produce are zero; encoded columns
    /// the schema does not know (categories unseen at build time) are
    /// dropped. Fails with [`ServiceError::NotReady`] when no schema has
    /// been built.
    pub fn align(
        &self,
        record: &NormalizedRecord,
        schema: Option<&Arc<ReferenceSchema>>,
    ) -> ServiceResult<AlignedFeatures> {
        let schema = schema.ok_or(ServiceError::NotReady)?;

        let mut values = vec![0.0_f32; schema.len()];
        let mut dropped = Vec::new();

        for column in self.encode(record) {
            match schema.position(&column) {
                Some(index) => values[index] = 1.0,
                None => dropped.push(column),
            }
        }

        if !dropped.is_empty() {
            debug!(dropped = ?dropped, "Encoded columns not in the reference schema were discarded");
        }

        Ok(AlignedFeatures {
            schema: Arc::clone(schema),
            values,
        })
    }
}

impl Default for FeatureAligner {
    fn default() -> Self {
        Self::new()
    }
}
