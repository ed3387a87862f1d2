use std::path::Path;

use rusqlite::types::{ToSql, ToSqlOutput, Value};
use rusqlite::{Connection, OpenFlags, params_from_iter};

use crate::domain::{TableName, quote_identifier};
use crate::error::NutritionError;
use crate::table::{Cell, Table};

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Null => ToSqlOutput::Owned(Value::Null),
            Cell::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            Cell::Real(value) => ToSqlOutput::Owned(Value::Real(*value)),
            Cell::Text(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, NutritionError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|err| NutritionError::Database(format!("open {}: {err}", path.display())))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, NutritionError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Drops `name` if present, recreates it from the table's columns and
    /// inserts every row. Runs in a single transaction so a failed load keeps
    /// the previous table.
    pub fn replace_table(
        &mut self,
        name: &TableName,
        table: &Table,
    ) -> Result<usize, NutritionError> {
        let quoted = name.quoted();
        let column_defs = table
            .columns()
            .iter()
            .map(|column| {
                format!(
                    "{} {}",
                    quote_identifier(&column.name),
                    column.kind.sql_type()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=table.column_count())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {quoted}"))?;
        tx.execute_batch(&format!("CREATE TABLE {quoted} ({column_defs})"))?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!("INSERT INTO {quoted} VALUES ({placeholders})"))?;
            for row in table.rows() {
                inserted += stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        tracing::info!(table = %name, rows = inserted, "table replaced");
        Ok(inserted)
    }

    pub fn row_count(&self, name: &TableName) -> Result<usize, NutritionError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", name.quoted()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn table_names(&self) -> Result<Vec<String>, NutritionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Column names and declared types, in table order.
    pub fn table_columns(
        &self,
        name: &TableName,
    ) -> Result<Vec<(String, String)>, NutritionError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", name.quoted()))?;
        let columns = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ColumnKind;
    use crate::table::Column;

    fn sample() -> Table {
        Table::new(
            vec![
                Column {
                    name: "name".to_string(),
                    kind: ColumnKind::Text,
                },
                Column {
                    name: "calories".to_string(),
                    kind: ColumnKind::Integer,
                },
            ],
            vec![
                vec![Cell::Text("Apple".to_string()), Cell::Integer(52)],
                vec![Cell::Text("Salt".to_string()), Cell::Null],
            ],
        )
    }

    #[test]
    fn replace_table_drops_previous_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let name: TableName = "foods".parse().unwrap();
        db.replace_table(&name, &sample()).unwrap();
        db.replace_table(&name, &sample()).unwrap();
        assert_eq!(db.row_count(&name).unwrap(), 2);
        assert_eq!(db.table_names().unwrap(), vec!["foods".to_string()]);
    }

    #[test]
    fn columns_follow_header_order_without_index() {
        let mut db = Database::open_in_memory().unwrap();
        let name: TableName = "foods".parse().unwrap();
        db.replace_table(&name, &sample()).unwrap();
        let columns = db.table_columns(&name).unwrap();
        assert_eq!(
            columns,
            vec![
                ("name".to_string(), "TEXT".to_string()),
                ("calories".to_string(), "INTEGER".to_string()),
            ]
        );
    }
}
