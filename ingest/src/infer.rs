//! Column type inference from raw string samples.
//!
//! Each column starts with every candidate type possible. Non-empty values
//! narrow the candidates: a value that does not parse as an integer rules
//! out `INTEGER`; one that also does not parse as a real rules out `REAL`
//! and settles the column as `TEXT`. The most specific surviving candidate
//! wins. Only the sample is inspected, so values past it may not fit the
//! inferred type; [`convert_value`] stores such values as text.

use sdif_core::SqlType;
use sdif_sqlite::Value;

/// Data rows sampled per column by default.
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy)]
struct Candidates {
    integer: bool,
    real: bool,
}

impl Candidates {
    const ALL: Self = Self {
        integer: true,
        real: true,
    };

    fn is_text(self) -> bool {
        !self.integer && !self.real
    }

    fn observe(&mut self, value: &str) {
        if self.integer && value.parse::<i64>().is_err() {
            self.integer = false;
        }
        if !self.integer && self.real && value.parse::<f64>().is_err() {
            self.real = false;
        }
    }

    fn resolve(self) -> SqlType {
        if self.integer {
            SqlType::Integer
        } else if self.real {
            SqlType::Real
        } else {
            SqlType::Text
        }
    }
}

/// Infers `INTEGER`, `REAL`, or `TEXT` for one column.
///
/// Empty and whitespace-only values carry no evidence. A column with no
/// evidence at all is `TEXT`.
///
/// # Examples
///
/// ```
/// use sdif_core::SqlType;
/// use sdif_ingest::infer_column_type;
///
/// assert_eq!(infer_column_type(["1", "2", "3"]), SqlType::Integer);
/// assert_eq!(infer_column_type(["1", "2.5"]), SqlType::Real);
/// assert_eq!(infer_column_type(["1", "x"]), SqlType::Text);
/// assert_eq!(infer_column_type(Vec::<&str>::new()), SqlType::Text);
/// ```
pub fn infer_column_type<I, S>(values: I) -> SqlType
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut candidates = Candidates::ALL;
    let mut saw_value = false;
    for value in values {
        let value = value.as_ref().trim();
        if value.is_empty() {
            continue;
        }
        saw_value = true;
        candidates.observe(value);
        if candidates.is_text() {
            break;
        }
    }
    if saw_value {
        candidates.resolve()
    } else {
        SqlType::Text
    }
}

/// Infers a type per column over the first `sample_size` rows. Missing
/// cells in short rows count as empty.
pub fn infer_column_types(rows: &[Vec<String>], width: usize, sample_size: usize) -> Vec<SqlType> {
    let sample = &rows[..rows.len().min(sample_size)];
    (0..width)
        .map(|column| {
            infer_column_type(
                sample
                    .iter()
                    .map(|row| row.get(column).map(String::as_str).unwrap_or("")),
            )
        })
        .collect()
}

/// Converts a raw cell for storage under `sql_type`.
///
/// Empty cells become NULL. Cells that do not parse as the column's type
/// are kept as text.
pub fn convert_value(raw: &str, sql_type: &SqlType) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match sql_type {
        SqlType::Integer => trimmed
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        SqlType::Real => trimmed
            .parse::<f64>()
            .map(Value::Real)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        _ => Value::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_carry_no_evidence() {
        assert_eq!(infer_column_type(["", "4", " "]), SqlType::Integer);
        assert_eq!(infer_column_type(["", ""]), SqlType::Text);
    }

    #[test]
    fn test_text_is_terminal() {
        assert_eq!(infer_column_type(["abc", "1", "2"]), SqlType::Text);
    }

    #[test]
    fn test_whole_real_is_real() {
        assert_eq!(infer_column_type(["1.0", "2"]), SqlType::Real);
        assert_eq!(infer_column_type(["-7", "+3"]), SqlType::Integer);
    }

    #[test]
    fn test_sample_bounds_inference() {
        let rows: Vec<Vec<String>> = vec![
            vec!["1".into(), "a".into()],
            vec!["2".into()],
            vec!["x".into(), "b".into()],
        ];
        assert_eq!(
            infer_column_types(&rows, 2, 2),
            [SqlType::Integer, SqlType::Text]
        );
        assert_eq!(infer_column_types(&rows, 2, 100)[0], SqlType::Text);
    }

    #[test]
    fn test_convert_value() {
        assert_eq!(convert_value("", &SqlType::Integer), Value::Null);
        assert_eq!(convert_value(" 42 ", &SqlType::Integer), Value::Integer(42));
        assert_eq!(convert_value("4.5", &SqlType::Real), Value::Real(4.5));
        assert_eq!(
            convert_value("n/a", &SqlType::Integer),
            Value::Text("n/a".into())
        );
        assert_eq!(convert_value("007", &SqlType::Text), Value::Text("007".into()));
    }
}
