use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::domain::ColumnKind;
use crate::error::NutritionError;

/// Field values read as missing, whatever the column kind.
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TRUE_TOKENS: &[&str] = &["True", "true", "TRUE"];
const FALSE_TOKENS: &[&str] = &["False", "false", "FALSE"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(value) => Some(*value as f64),
            Cell::Real(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.columns.iter().position(|c| c.name == column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }
}

pub fn read_tsv(
    path: &Path,
    schema: &BTreeMap<String, ColumnKind>,
) -> Result<Table, NutritionError> {
    let file = File::open(path).map_err(|err| {
        NutritionError::Filesystem(format!("open dataset {}: {err}", path.display()))
    })?;
    parse_tsv(file, schema)
}

/// Parses tab-separated text whose first row is the header. Columns named in
/// `schema` are validated against the declared kind; the rest are inferred.
pub fn parse_tsv<R: Read>(
    reader: R,
    schema: &BTreeMap<String, ColumnKind>,
) -> Result<Table, NutritionError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|err| parse_error(1, &err))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    if headers.is_empty() || headers.iter().all(|name| name.is_empty()) {
        return Err(NutritionError::EmptyDataset);
    }
    let names = dedupe_headers(&headers);
    let width = names.len();

    for declared in schema.keys() {
        if !names.iter().any(|name| name == declared) {
            return Err(NutritionError::Parse {
                line: 1,
                message: format!("declared column {declared} is not in the header"),
            });
        }
    }

    let mut raw_rows: Vec<Vec<Option<String>>> = Vec::new();
    let mut lines: Vec<u64> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| {
            let line = err.position().map(|pos| pos.line()).unwrap_or(0);
            parse_error(line, &err)
        })?;
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);
        if record.len() > width {
            return Err(NutritionError::Parse {
                line,
                message: format!("expected {width} fields, saw {}", record.len()),
            });
        }
        let mut row = Vec::with_capacity(width);
        for field in record.iter() {
            row.push((!is_missing(field)).then(|| field.to_string()));
        }
        row.resize(width, None);
        raw_rows.push(row);
        lines.push(line);
    }

    let mut columns = Vec::with_capacity(width);
    for (index, name) in names.into_iter().enumerate() {
        let kind = match schema.get(&name) {
            Some(kind) => *kind,
            None => infer_kind(raw_rows.iter().map(|row| row[index].as_deref())),
        };
        columns.push(Column { name, kind });
    }

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (raw, line) in raw_rows.into_iter().zip(lines) {
        let mut cells = Vec::with_capacity(width);
        for (value, column) in raw.into_iter().zip(&columns) {
            let cell = match value {
                None => Cell::Null,
                Some(value) => convert(value, column, line)?,
            };
            cells.push(cell);
        }
        rows.push(cells);
    }

    tracing::debug!(rows = rows.len(), columns = columns.len(), "dataset parsed");
    Ok(Table { columns, rows })
}

fn parse_error(line: u64, err: &csv::Error) -> NutritionError {
    NutritionError::Parse {
        line,
        message: err.to_string(),
    }
}

fn is_missing(field: &str) -> bool {
    MISSING_MARKERS.contains(&field)
}

fn parse_bool(value: &str) -> Option<bool> {
    if TRUE_TOKENS.contains(&value) {
        Some(true)
    } else if FALSE_TOKENS.contains(&value) {
        Some(false)
    } else {
        None
    }
}

/// Blank header fields become `Unnamed: <index>`; repeated names get `.1`,
/// `.2`, ... suffixes so every column stays addressable.
fn dedupe_headers(headers: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(headers.len());
    for (index, header) in headers.iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {index}")
        } else {
            header.clone()
        };
        let mut name = base.clone();
        while let Some(count) = seen.get_mut(&name) {
            *count += 1;
            name = format!("{base}.{count}");
        }
        seen.insert(name.clone(), 0);
        names.push(name);
    }
    names
}

fn infer_kind<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ColumnKind {
    let mut has_null = false;
    let mut all_integer = true;
    let mut all_real = true;
    let mut all_bool = true;
    let mut seen_value = false;

    for value in values {
        let Some(value) = value else {
            has_null = true;
            continue;
        };
        seen_value = true;
        let trimmed = value.trim();
        if all_integer && trimmed.parse::<i64>().is_err() {
            all_integer = false;
        }
        if all_real && trimmed.parse::<f64>().is_err() {
            all_real = false;
        }
        if all_bool && parse_bool(value).is_none() {
            all_bool = false;
        }
        if !all_integer && !all_real && !all_bool {
            return ColumnKind::Text;
        }
    }

    if !seen_value {
        return ColumnKind::Real;
    }
    if all_integer {
        if has_null {
            ColumnKind::Real
        } else {
            ColumnKind::Integer
        }
    } else if all_real {
        ColumnKind::Real
    } else if all_bool && !has_null {
        ColumnKind::Boolean
    } else {
        ColumnKind::Text
    }
}

fn convert(value: String, column: &Column, line: u64) -> Result<Cell, NutritionError> {
    let mismatch = |value: &str| NutritionError::SchemaMismatch {
        line,
        column: column.name.clone(),
        expected: column.kind.to_string(),
        value: value.to_string(),
    };
    match column.kind {
        ColumnKind::Integer => value
            .trim()
            .parse::<i64>()
            .map(Cell::Integer)
            .map_err(|_| mismatch(&value)),
        ColumnKind::Real => value
            .trim()
            .parse::<f64>()
            .map(Cell::Real)
            .map_err(|_| mismatch(&value)),
        ColumnKind::Boolean => parse_bool(&value)
            .map(|flag| Cell::Integer(i64::from(flag)))
            .ok_or_else(|| mismatch(&value)),
        ColumnKind::Text => Ok(Cell::Text(value)),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn parse(input: &str) -> Result<Table, NutritionError> {
        parse_tsv(input.as_bytes(), &BTreeMap::new())
    }

    #[test]
    fn integer_column_with_missing_values_becomes_real() {
        let table = parse("name\tfiber\nApple\t2\nSalt\t\n").unwrap();
        assert_eq!(table.column("fiber").unwrap().kind, ColumnKind::Real);
        assert_eq!(table.value(0, "fiber"), Some(&Cell::Real(2.0)));
        assert_eq!(table.value(1, "fiber"), Some(&Cell::Null));
    }

    #[test]
    fn boolean_columns_store_integers() {
        let table = parse("name\tvegan\nTofu\tTrue\nEgg\tfalse\n").unwrap();
        assert_eq!(table.column("vegan").unwrap().kind, ColumnKind::Boolean);
        assert_eq!(table.value(0, "vegan"), Some(&Cell::Integer(1)));
        assert_eq!(table.value(1, "vegan"), Some(&Cell::Integer(0)));
    }

    #[test]
    fn short_rows_are_padded() {
        let table = parse("a\tb\tc\nx\t1\n").unwrap();
        assert_eq!(table.value(0, "c"), Some(&Cell::Null));
        assert_eq!(table.column("c").unwrap().kind, ColumnKind::Real);
    }

    #[test]
    fn long_rows_are_rejected() {
        let err = parse("a\tb\nx\t1\t2\n").unwrap_err();
        assert_matches!(err, NutritionError::Parse { line: 2, .. });
    }

    #[test]
    fn duplicate_headers_are_suffixed() {
        let table = parse("name\tname\tname\nA\tB\tC\n").unwrap();
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "name.1", "name.2"]);
    }

    #[test]
    fn blank_headers_are_named_by_position() {
        let table = parse("\tname\t\n1\tApple\tx\n").unwrap();
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Unnamed: 0", "name", "Unnamed: 2"]);
        assert_eq!(table.value(0, "Unnamed: 2").and_then(Cell::as_str), Some("x"));
    }

    #[test]
    fn empty_input_has_no_header() {
        let err = parse("").unwrap_err();
        assert_matches!(err, NutritionError::EmptyDataset);
    }

    #[test]
    fn declared_schema_is_enforced() {
        let mut schema = BTreeMap::new();
        schema.insert("calories".to_string(), ColumnKind::Integer);
        let err = parse_tsv("name\tcalories\nApple\t52\nPear\tlots\n".as_bytes(), &schema)
            .unwrap_err();
        assert_matches!(
            err,
            NutritionError::SchemaMismatch { line: 3, ref column, .. } if column == "calories"
        );
    }

    #[test]
    fn declared_column_must_exist() {
        let mut schema = BTreeMap::new();
        schema.insert("sodium".to_string(), ColumnKind::Real);
        let err = parse_tsv("name\tcalories\nApple\t52\n".as_bytes(), &schema).unwrap_err();
        assert_matches!(err, NutritionError::Parse { line: 1, .. });
    }

    #[test]
    fn quoted_json_fields_survive() {
        let table = parse("id\tnutrients\nfd_1\t{\"calories\": 52}\n").unwrap();
        assert_eq!(
            table.value(0, "nutrients").and_then(Cell::as_str),
            Some("{\"calories\": 52}")
        );
    }
}
