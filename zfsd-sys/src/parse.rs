// SPDX-License-Identifier: GPL-3.0-only

//! Folding `zfs` output rows into [`Dataset`] records

use std::sync::Arc;

use thiserror::Error;
use zfsd_types::Dataset;

use crate::command::Row;
use crate::properties::{DatasetSchema, OutputShape};

/// Minimum fields in a property row: name, property, value
const PROPERTY_ROW_FIELDS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no rows returned")]
    Empty,

    #[error("expected {expected} fields per row, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("expected at least {minimum} fields per row, found {found}")]
    ShortRow { minimum: usize, found: usize },

    #[error("rows describe more than one dataset ('{first}' and '{other}')")]
    MixedDatasets { first: String, other: String },

    #[error("invalid value '{value}' for property {property}")]
    InvalidValue { property: String, value: String },
}

/// Decodes rows in the shape selected by the schema
#[derive(Debug, Clone)]
pub struct RecordParser {
    schema: Arc<DatasetSchema>,
}

impl RecordParser {
    pub fn new(schema: Arc<DatasetSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    /// Decode rows that must describe exactly one dataset
    pub fn parse_single(&self, rows: &[Row]) -> Result<Dataset, ParseError> {
        match self.schema.shape() {
            OutputShape::Columns => match rows {
                [] => Err(ParseError::Empty),
                [row] => self.parse_column_row(row),
                [first, second, ..] => Err(ParseError::MixedDatasets {
                    first: first.first().cloned().unwrap_or_default(),
                    other: second.first().cloned().unwrap_or_default(),
                }),
            },
            OutputShape::PropertyRows => {
                let mut datasets = self.fold_property_rows(rows)?;
                match datasets.len() {
                    0 => Err(ParseError::Empty),
                    1 => Ok(datasets.remove(0)),
                    _ => Err(ParseError::MixedDatasets {
                        first: datasets[0].name.clone(),
                        other: datasets[1].name.clone(),
                    }),
                }
            }
        }
    }

    /// Decode rows describing any number of datasets
    pub fn parse_grouped(&self, rows: &[Row]) -> Result<Vec<Dataset>, ParseError> {
        match self.schema.shape() {
            OutputShape::Columns => rows.iter().map(|row| self.parse_column_row(row)).collect(),
            OutputShape::PropertyRows => self.fold_property_rows(rows),
        }
    }

    fn parse_column_row(&self, row: &[String]) -> Result<Dataset, ParseError> {
        let expected = self.schema.column_count();
        if row.len() != expected {
            return Err(ParseError::FieldCount {
                expected,
                found: row.len(),
            });
        }

        let mut dataset = Dataset::new(row[0].clone());
        for (property, value) in self.schema.properties().iter().zip(&row[1..]) {
            property
                .field
                .apply(&mut dataset, property.name, value, self.schema.decoding())?;
        }
        Ok(dataset)
    }

    /// Rows for one dataset are contiguous; a new record starts whenever the
    /// leading name changes.
    fn fold_property_rows(&self, rows: &[Row]) -> Result<Vec<Dataset>, ParseError> {
        let mut datasets: Vec<Dataset> = Vec::new();

        for row in rows {
            if row.len() < PROPERTY_ROW_FIELDS {
                return Err(ParseError::ShortRow {
                    minimum: PROPERTY_ROW_FIELDS,
                    found: row.len(),
                });
            }

            let (name, property, value) = (&row[0], &row[1], &row[2]);
            let starts_record = datasets.last().is_none_or(|current| current.name != *name);
            if starts_record {
                datasets.push(Dataset::new(name.clone()));
            }

            let Some(known) = self.schema.property(property) else {
                continue;
            };
            if let Some(dataset) = datasets.last_mut() {
                known
                    .field
                    .apply(dataset, property, value, self.schema.decoding())?;
            }
        }

        Ok(datasets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::split_rows;
    use crate::properties::{Decoding, Field, Property};
    use zfsd_types::DatasetType;

    fn parser(shape: OutputShape, decoding: Decoding) -> RecordParser {
        RecordParser::new(Arc::new(DatasetSchema::new(shape, decoding)))
    }

    fn property_rows(text: &str) -> Vec<Row> {
        split_rows(text)
    }

    #[test]
    fn folds_property_rows_into_one_dataset() {
        let rows = property_rows(
            "tank/home\ttype\tfilesystem\t-\n\
             tank/home\tused\t1024\t-\n\
             tank/home\tavailable\t4096\t-\n\
             tank/home\tvolsize\t-\t-\n\
             tank/home\tmountpoint\t/home\tlocal\n\
             tank/home\tcompression\tlz4\tinherited from tank\n\
             tank/home\torigin\t-\t-\n\
             tank/home\trecordsize\t131072\tdefault\n",
        );

        let dataset = parser(OutputShape::PropertyRows, Decoding::Lenient)
            .parse_single(&rows)
            .expect("single dataset");

        assert_eq!(dataset.name, "tank/home");
        assert_eq!(dataset.dataset_type, Some(DatasetType::Filesystem));
        assert_eq!(dataset.used, Some(1024));
        assert_eq!(dataset.available, Some(4096));
        assert_eq!(dataset.volume_size, None);
        assert_eq!(dataset.mountpoint, "/home");
        assert_eq!(dataset.compression, "lz4");
        assert_eq!(dataset.origin, "");
        assert!(!dataset.is_clone());
    }

    #[test]
    fn groups_property_rows_by_leading_name() {
        let rows = property_rows(
            "tank\ttype\tfilesystem\n\
             tank\tused\t10\n\
             tank/vol\ttype\tvolume\n\
             tank/vol\tvolsize\t8192\n\
             tank/vol@s1\ttype\tsnapshot\n",
        );

        let datasets = parser(OutputShape::PropertyRows, Decoding::Lenient)
            .parse_grouped(&rows)
            .expect("grouped datasets");

        let names: Vec<&str> = datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["tank", "tank/vol", "tank/vol@s1"]);
        assert_eq!(datasets[1].volume_size, Some(8192));
        assert!(datasets[2].is_snapshot());
    }

    #[test]
    fn dash_values_decode_to_absent_or_empty() {
        let rows = property_rows("tank\tquota\t-\ntank\tmountpoint\t-\n");
        let dataset = parser(OutputShape::PropertyRows, Decoding::Lenient)
            .parse_single(&rows)
            .expect("single dataset");
        assert_eq!(dataset.quota.unwrap_or_default(), 0);
        assert_eq!(dataset.quota, None);
        assert_eq!(dataset.mountpoint, "");
    }

    #[test]
    fn malformed_number_is_zero_not_an_error() {
        let rows = property_rows("tank\tused\tlots\n");
        let dataset = parser(OutputShape::PropertyRows, Decoding::Lenient)
            .parse_single(&rows)
            .expect("lenient parse");
        assert_eq!(dataset.used, Some(0));

        let strict = parser(OutputShape::PropertyRows, Decoding::Strict).parse_single(&rows);
        assert!(matches!(strict, Err(ParseError::InvalidValue { .. })));
    }

    #[test]
    fn single_rejects_mixed_or_missing_datasets() {
        let parser = parser(OutputShape::PropertyRows, Decoding::Lenient);
        assert_eq!(parser.parse_single(&[]), Err(ParseError::Empty));

        let rows = property_rows("tank\tused\t1\ntank/a\tused\t2\n");
        assert_eq!(
            parser.parse_single(&rows),
            Err(ParseError::MixedDatasets {
                first: "tank".to_string(),
                other: "tank/a".to_string(),
            })
        );
    }

    #[test]
    fn short_property_rows_are_malformed() {
        let rows = property_rows("tank\tused\n");
        assert_eq!(
            parser(OutputShape::PropertyRows, Decoding::Lenient).parse_grouped(&rows),
            Err(ParseError::ShortRow {
                minimum: 3,
                found: 2,
            })
        );
    }

    #[test]
    fn parses_column_rows_in_schema_order() {
        let schema = Arc::new(DatasetSchema::with_properties(
            vec![
                Property::new("type", Field::Type),
                Property::new("used", Field::Used),
                Property::new("origin", Field::Origin),
            ],
            OutputShape::Columns,
            Decoding::Lenient,
        ));
        let parser = RecordParser::new(schema);

        let rows = split_rows("tank/clone\tfilesystem\t77\ttank/a@s1\ntank/b\tvolume\t-\t-\n");
        let datasets = parser.parse_grouped(&rows).expect("column rows");

        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].origin, "tank/a@s1");
        assert_eq!(datasets[0].used, Some(77));
        assert_eq!(datasets[1].dataset_type, Some(DatasetType::Volume));
        assert_eq!(datasets[1].used, None);
    }

    #[test]
    fn column_rows_with_wrong_width_are_malformed() {
        let parser = parser(OutputShape::Columns, Decoding::Lenient);
        let rows = split_rows("tank\tfilesystem\t1\n");
        assert_eq!(
            parser.parse_single(&rows),
            Err(ParseError::FieldCount {
                expected: parser.schema().column_count(),
                found: 3,
            })
        );
    }
}
