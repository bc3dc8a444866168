//! Configurable structural comparison of container schemas.
//!
//! [`SchemaComparator`] holds a [`ComparisonConfig`] and offers two
//! independent operations:
//!
//! - [`compare`](SchemaComparator::compare): symmetric equivalence with a
//!   diff report at one of three [`Verbosity`] levels.
//! - [`is_compatible_with`](SchemaComparator::is_compatible_with): whether
//!   a producer schema meets every requirement of a consumer schema.
//!
//! Both work on a [`CanonicalSchema`] projection, so switched-off rules never
//! show up as differences. The comparator keeps no state between calls.
//!
//! # Examples
//!
//! ```
//! use sdif_core::{ContainerSchema, SchemaComparator, Verbosity};
//!
//! let schema = ContainerSchema::default();
//! let comparator = SchemaComparator::default();
//!
//! let result = comparator.compare(&schema, &schema, Verbosity::Summary);
//! assert!(result.equivalent);
//! assert!(result.report.is_empty());
//! assert!(comparator.is_compatible_with(&schema, &schema));
//! ```

mod canonical;
mod compat;
mod config;
mod diff;

pub use canonical::{
    CanonicalSchema, ColumnShape, ForeignKeyShape, LinkShape, LinksShape, MediaShape, ObjectShape,
    TableShape, canonical_json,
};
pub use compat::{CompatibilityReport, RequirementCategory, UnmetRequirement};
pub use config::{ComparisonConfig, LinksMode, MediaMode, ObjectsMode, TechnicalMetadataMode};
pub use diff::{ChangeKind, Comparison, DiffReport, Difference, Verbosity};

use crate::schema::ContainerSchema;

/// Compares extracted schemas under a fixed rule configuration.
#[derive(Debug, Clone, Default)]
pub struct SchemaComparator {
    config: ComparisonConfig,
}

impl SchemaComparator {
    pub fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Projects `schema` onto the enforced rules.
    pub fn canonicalize(&self, schema: &ContainerSchema) -> CanonicalSchema {
        canonical::canonicalize(schema, &self.config)
    }

    /// Checks two schemas for equivalence.
    ///
    /// Equivalent schemas always produce an empty report, whatever the
    /// verbosity.
    pub fn compare(
        &self,
        left: &ContainerSchema,
        right: &ContainerSchema,
        verbosity: Verbosity,
    ) -> Comparison {
        let left = self.canonicalize(left);
        let right = self.canonicalize(right);
        let differences = diff::diff_schemas(&left, &right, &self.config);
        tracing::debug!(differences = differences.len(), "Compared schemas");
        Comparison {
            equivalent: differences.is_empty(),
            report: DiffReport::build(differences, verbosity, &left, &right),
        }
    }

    /// Returns `true` if `producer` satisfies every requirement of
    /// `consumer`. The producer may contain additional elements.
    pub fn is_compatible_with(&self, consumer: &ContainerSchema, producer: &ContainerSchema) -> bool {
        self.check_compatibility(consumer, producer).is_compatible()
    }

    /// Like [`is_compatible_with`](Self::is_compatible_with), reporting the
    /// first unmet requirement of every failing category.
    pub fn check_compatibility(
        &self,
        consumer: &ContainerSchema,
        producer: &ContainerSchema,
    ) -> CompatibilityReport {
        let consumer = self.canonicalize(consumer);
        let producer = self.canonicalize(producer);
        compat::check(&consumer, &producer, &self.config)
    }
}
