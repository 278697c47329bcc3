//! Catalog introspection.
//!
//! Every query casts its projection to `text` so results travel through
//! the generic [`DbConn::query_rows`] interface unchanged.

use veildump_core::Column;

use crate::db::DbConn;
use crate::error::{Error, Result};

/// One user table eligible for dumping.
#[derive(Debug, Clone)]
pub struct DiscoveredTable {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    /// On-disk size estimate, used for longest-job-first scheduling.
    pub size_bytes: i64,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
}

/// One foreign-key constraint.
#[derive(Debug, Clone)]
pub struct DiscoveredForeignKey {
    pub constraint: String,
    pub child_oid: u32,
    pub parent_oid: u32,
    pub child_columns: Vec<String>,
    pub parent_columns: Vec<String>,
    /// Full constraint definition, used verbatim in post-data DDL.
    pub definition: String,
}

/// One sequence with its current position.
#[derive(Debug, Clone)]
pub struct DiscoveredSequence {
    pub schema: String,
    pub name: String,
    pub last_value: i64,
    pub is_called: bool,
}

/// One non-primary-key index.
#[derive(Debug, Clone)]
pub struct DiscoveredIndex {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub definition: String,
}

/// One inheritance link (child table inherits parent table).
#[derive(Debug, Clone, Copy)]
pub struct DiscoveredInheritance {
    pub child_oid: u32,
    pub parent_oid: u32,
}

const TABLES_SQL: &str = "\
SELECT c.oid::text, n.nspname::text, c.relname::text, pg_catalog.pg_table_size(c.oid)::text
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind = 'r'
  AND n.nspname NOT IN ('pg_catalog', 'information_schema')
ORDER BY n.nspname, c.relname";

const SEQUENCES_SQL: &str = "\
SELECT n.nspname::text, c.relname::text
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind = 'S'
  AND n.nspname NOT IN ('pg_catalog', 'information_schema')
ORDER BY n.nspname, c.relname";

const FOREIGN_KEYS_SQL: &str = "\
SELECT con.conname::text, con.conrelid::text, con.confrelid::text,
       (SELECT pg_catalog.string_agg(a.attname, ',' ORDER BY k.ord)
        FROM pg_catalog.unnest(con.conkey) WITH ORDINALITY k(attnum, ord)
        JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum)::text,
       (SELECT pg_catalog.string_agg(a.attname, ',' ORDER BY k.ord)
        FROM pg_catalog.unnest(con.confkey) WITH ORDINALITY k(attnum, ord)
        JOIN pg_catalog.pg_attribute a ON a.attrelid = con.confrelid AND a.attnum = k.attnum)::text,
       pg_catalog.pg_get_constraintdef(con.oid)::text
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class c ON c.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE con.contype = 'f'
  AND n.nspname NOT IN ('pg_catalog', 'information_schema')
ORDER BY con.conname, con.oid";

const INDEXES_SQL: &str = "\
SELECT i.schemaname::text, i.tablename::text, i.indexname::text, i.indexdef::text
FROM pg_catalog.pg_indexes i
WHERE i.schemaname NOT IN ('pg_catalog', 'information_schema')
  AND i.indexname NOT IN (
        SELECT con.conname FROM pg_catalog.pg_constraint con WHERE con.contype IN ('p', 'u'))
ORDER BY i.schemaname, i.tablename, i.indexname";

const INHERITANCE_SQL: &str = "\
SELECT inh.inhrelid::text, inh.inhparent::text
FROM pg_catalog.pg_inherits inh
ORDER BY inh.inhrelid, inh.inhseqno";

fn columns_sql(table_oid: u32) -> String {
    format!(
        "SELECT a.attname::text, a.atttypid::text, \
                pg_catalog.format_type(a.atttypid, a.atttypmod)::text, \
                a.attnotnull::text, a.atttypmod::text \
         FROM pg_catalog.pg_attribute a \
         WHERE a.attrelid = {table_oid} AND a.attnum > 0 AND NOT a.attisdropped \
         ORDER BY a.attnum"
    )
}

fn primary_key_sql(table_oid: u32) -> String {
    format!(
        "SELECT a.attname::text \
         FROM pg_catalog.pg_index i \
         JOIN pg_catalog.unnest(i.indkey) WITH ORDINALITY k(attnum, ord) ON TRUE \
         JOIN pg_catalog.pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = k.attnum \
         WHERE i.indrelid = {table_oid} AND i.indisprimary \
         ORDER BY k.ord"
    )
}

fn cell<'a>(row: &'a [Option<String>], index: usize, what: &str) -> Result<&'a str> {
    row.get(index)
        .and_then(|c| c.as_deref())
        .ok_or_else(|| Error::Database(format!("introspection returned NULL for {what}")))
}

fn parse_u32(text: &str, what: &str) -> Result<u32> {
    text.parse()
        .map_err(|_| Error::Database(format!("introspection returned non-numeric {what}: {text:?}")))
}

fn parse_bool(text: &str) -> bool {
    text == "t" || text == "true"
}

/// Lists user tables with columns, primary keys, and size estimates.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure or malformed results.
pub fn discover_tables(conn: &mut dyn DbConn) -> Result<Vec<DiscoveredTable>> {
    let mut tables = Vec::new();
    for row in conn.query_rows(TABLES_SQL)? {
        let oid = parse_u32(cell(&row, 0, "table oid")?, "table oid")?;
        let schema = cell(&row, 1, "schema name")?.to_owned();
        let name = cell(&row, 2, "table name")?.to_owned();
        let size_bytes = cell(&row, 3, "table size")?.parse().unwrap_or(0);

        let mut columns = Vec::new();
        for (ordinal, col_row) in conn.query_rows(&columns_sql(oid))?.into_iter().enumerate() {
            let col_name = cell(&col_row, 0, "column name")?.to_owned();
            let type_oid = parse_u32(cell(&col_row, 1, "column type oid")?, "column type oid")?;
            let type_name = cell(&col_row, 2, "column type")?.to_owned();
            let not_null = parse_bool(cell(&col_row, 3, "column nullability")?);
            let length: i32 = cell(&col_row, 4, "column typmod")?.parse().unwrap_or(-1);
            columns.push(
                Column::new(col_name, ordinal, type_oid, type_name)
                    .with_not_null(not_null)
                    .with_length(length),
            );
        }

        let primary_key = conn
            .query_rows(&primary_key_sql(oid))?
            .into_iter()
            .map(|pk_row| cell(&pk_row, 0, "primary key column").map(ToOwned::to_owned))
            .collect::<Result<Vec<_>>>()?;

        tables.push(DiscoveredTable { oid, schema, name, size_bytes, columns, primary_key });
    }
    Ok(tables)
}

/// Lists foreign-key constraints between user tables.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure or malformed results.
pub fn discover_foreign_keys(conn: &mut dyn DbConn) -> Result<Vec<DiscoveredForeignKey>> {
    let mut keys = Vec::new();
    for row in conn.query_rows(FOREIGN_KEYS_SQL)? {
        keys.push(DiscoveredForeignKey {
            constraint: cell(&row, 0, "constraint name")?.to_owned(),
            child_oid: parse_u32(cell(&row, 1, "child oid")?, "child oid")?,
            parent_oid: parse_u32(cell(&row, 2, "parent oid")?, "parent oid")?,
            child_columns: cell(&row, 3, "child columns")?
                .split(',')
                .map(ToOwned::to_owned)
                .collect(),
            parent_columns: cell(&row, 4, "parent columns")?
                .split(',')
                .map(ToOwned::to_owned)
                .collect(),
            definition: cell(&row, 5, "constraint definition")?.to_owned(),
        });
    }
    Ok(keys)
}

/// Lists sequences with their current value.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure or malformed results.
pub fn discover_sequences(conn: &mut dyn DbConn) -> Result<Vec<DiscoveredSequence>> {
    let mut sequences = Vec::new();
    for row in conn.query_rows(SEQUENCES_SQL)? {
        let schema = cell(&row, 0, "sequence schema")?.to_owned();
        let name = cell(&row, 1, "sequence name")?.to_owned();
        let state_sql = format!(
            "SELECT last_value::text, is_called::text FROM {}.{}",
            quote_ident(&schema),
            quote_ident(&name)
        );
        let state = conn.query_rows(&state_sql)?;
        let (last_value, is_called) = match state.first() {
            Some(row) => (
                cell(row, 0, "sequence last_value")?.parse().unwrap_or(1),
                parse_bool(cell(row, 1, "sequence is_called")?),
            ),
            None => (1, false),
        };
        sequences.push(DiscoveredSequence { schema, name, last_value, is_called });
    }
    Ok(sequences)
}

/// Lists secondary indexes.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure or malformed results.
pub fn discover_indexes(conn: &mut dyn DbConn) -> Result<Vec<DiscoveredIndex>> {
    let mut indexes = Vec::new();
    for row in conn.query_rows(INDEXES_SQL)? {
        indexes.push(DiscoveredIndex {
            schema: cell(&row, 0, "index schema")?.to_owned(),
            table: cell(&row, 1, "index table")?.to_owned(),
            name: cell(&row, 2, "index name")?.to_owned(),
            definition: cell(&row, 3, "index definition")?.to_owned(),
        });
    }
    Ok(indexes)
}

/// Lists table inheritance links.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure or malformed results.
pub fn discover_inheritance(conn: &mut dyn DbConn) -> Result<Vec<DiscoveredInheritance>> {
    let mut links = Vec::new();
    for row in conn.query_rows(INHERITANCE_SQL)? {
        links.push(DiscoveredInheritance {
            child_oid: parse_u32(cell(&row, 0, "child oid")?, "child oid")?,
            parent_oid: parse_u32(cell(&row, 1, "parent oid")?, "parent oid")?,
        });
    }
    Ok(links)
}

/// Double-quotes an identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockDb;
    use crate::db::Connector;

    #[test]
    fn tables_discovery_parses_scripted_rows() {
        let db = MockDb::new();
        db.add_query_result(
            "relkind = 'r'",
            vec![vec![
                Some("16384".into()),
                Some("public".into()),
                Some("users".into()),
                Some("8192".into()),
            ]],
        );
        db.add_query_result(
            "a.attnum > 0",
            vec![
                vec![
                    Some("id".into()),
                    Some("23".into()),
                    Some("integer".into()),
                    Some("t".into()),
                    Some("-1".into()),
                ],
                vec![
                    Some("name".into()),
                    Some("25".into()),
                    Some("text".into()),
                    Some("f".into()),
                    Some("-1".into()),
                ],
            ],
        );
        db.add_query_result(
            "indisprimary",
            vec![vec![Some("id".into())]],
        );

        let mut conn = db.connect().unwrap();
        let tables = discover_tables(conn.as_mut()).unwrap();
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.oid, 16384);
        assert_eq!(table.columns.len(), 2);
        assert!(table.columns[0].not_null);
        assert_eq!(table.columns[1].ordinal, 1);
        assert_eq!(table.primary_key, vec!["id".to_owned()]);
    }

    #[test]
    fn foreign_key_columns_split_in_order() {
        let db = MockDb::new();
        db.add_query_result(
            "contype = 'f'",
            vec![vec![
                Some("orders_user_fk".into()),
                Some("2".into()),
                Some("1".into()),
                Some("user_id,region_id".into()),
                Some("id,region_id".into()),
                Some("FOREIGN KEY (user_id, region_id) REFERENCES users(id, region_id)".into()),
            ]],
        );
        let mut conn = db.connect().unwrap();
        let keys = discover_foreign_keys(conn.as_mut()).unwrap();
        assert_eq!(keys[0].child_columns, vec!["user_id".to_owned(), "region_id".to_owned()]);
        assert_eq!(keys[0].parent_columns, vec!["id".to_owned(), "region_id".to_owned()]);
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
