//! Dump planning.
//!
//! The catalog turns introspection results plus config into a
//! [`DumpPlan`]: a frozen TOC (dense dump ids, dependency edges, DDL for
//! every section) and one [`TableTask`] per data entry. Planning happens
//! entirely before any data is written; workers only consume tasks.

pub mod discover;

use std::collections::BTreeMap;

use tracing::{debug, info};

use veildump_core::{Column, ValidationWarning};
use veildump_subset::{build_subset_plan, FkGraph, SubsetOptions, TableNode};
use veildump_toc::{desc, DumpId, DumpSequence, Entry, Section, Toc};
use veildump_transform::{BoundTransformer, TransformerRegistry};

use crate::config::{Config, TableConfig, TransformerUse};
use crate::db::DbConn;
use crate::error::{Error, Result};

use discover::{quote_ident, DiscoveredTable};

/// One data-section dump task.
#[derive(Debug, Clone)]
pub struct TableTask {
    /// Dump id of the TABLE DATA entry this task fills.
    pub dump_id: DumpId,
    /// Table OID.
    pub oid: u32,
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Columns in COPY order.
    pub columns: Vec<Column>,
    /// Primary key columns.
    pub primary_key: Vec<String>,
    /// Size estimate for longest-job-first scheduling.
    pub size_bytes: i64,
    /// Configured transformers, in chain order.
    pub transformers: Vec<TransformerUse>,
    /// SELECT overriding the dumped row set (user query or subset filter).
    pub query: Option<String>,
    /// Row cap for validation runs.
    pub validate_limited_records: Option<u64>,
}

impl TableTask {
    /// `"schema"."table"`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    /// `schema.table` for logs and error records.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Data object name within the archive.
    #[must_use]
    pub fn data_file_name(&self) -> String {
        format!("{}.dat.gz", self.dump_id)
    }

    fn column_list(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        names.join(", ")
    }

    /// Server-side `COPY ... TO STDOUT` statement for this task.
    #[must_use]
    pub fn copy_out_sql(&self) -> String {
        let base = match &self.query {
            Some(query) => query.clone(),
            None => {
                format!("SELECT {} FROM {}", self.column_list(), self.qualified_name())
            }
        };
        let select = match self.validate_limited_records {
            Some(limit) => format!("SELECT * FROM ({base}) q LIMIT {limit}"),
            None => base,
        };
        format!("COPY ({select}) TO STDOUT")
    }

    /// `COPY ... FROM stdin;` statement recorded in the TOC and replayed
    /// by restore.
    #[must_use]
    pub fn copy_in_sql(&self) -> String {
        format!("COPY {} ({}) FROM stdin;", self.qualified_name(), self.column_list())
    }

    /// Binds this task's transformer chain against the registry.
    ///
    /// All warnings are annotated with the table and returned; instances
    /// are complete only when no warning is fatal.
    ///
    /// # Errors
    ///
    /// Returns factory errors that are not expressible as warnings.
    pub fn bind_transformers(
        &self,
        registry: &TransformerRegistry,
    ) -> Result<(Vec<BoundTransformer>, Vec<ValidationWarning>)> {
        let mut instances = Vec::new();
        let mut warnings = Vec::new();
        for use_ in &self.transformers {
            match registry.get(&use_.name) {
                None => warnings.push(
                    ValidationWarning::error()
                        .with_msg("transformer is not registered")
                        .with_meta("transformer", use_.name.clone()),
                ),
                Some(definition) => {
                    let (instance, mut batch) = definition.bind(&use_.params, &self.columns)?;
                    for warning in &mut batch {
                        warning.meta.insert("schema".into(), self.schema.clone().into());
                        warning.meta.insert("table".into(), self.name.clone().into());
                    }
                    warnings.extend(batch);
                    if let Some(instance) = instance {
                        instances.push(instance);
                    }
                }
            }
        }
        Ok((instances, warnings))
    }
}

/// The frozen output of dump planning.
#[derive(Debug)]
pub struct DumpPlan {
    /// The complete TOC, ready to serialize once data is durable.
    pub toc: Toc,
    /// Data tasks, aligned with the TOC's TABLE DATA entries.
    pub tables: Vec<TableTask>,
    /// Every validation warning planning produced.
    pub warnings: Vec<ValidationWarning>,
}

/// Basic server facts recorded in the TOC header.
#[derive(Debug, Default, Clone)]
pub struct ServerFacts {
    pub dbname: Option<String>,
    pub server_version: Option<String>,
    pub current_user: Option<String>,
}

/// Queries database name, version, and user for the TOC header.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub fn gather_facts(conn: &mut dyn DbConn) -> Result<ServerFacts> {
    let rows = conn.query_rows(
        "SELECT current_database()::text, current_setting('server_version')::text, current_user::text",
    )?;
    let Some(row) = rows.first() else {
        return Ok(ServerFacts::default());
    };
    Ok(ServerFacts {
        dbname: row.first().cloned().flatten(),
        server_version: row.get(1).cloned().flatten(),
        current_user: row.get(2).cloned().flatten(),
    })
}

fn table_ddl(table: &DiscoveredTable) -> String {
    let mut ddl = format!(
        "CREATE TABLE {}.{} (",
        quote_ident(&table.schema),
        quote_ident(&table.name)
    );
    for (i, column) in table.columns.iter().enumerate() {
        if i > 0 {
            ddl.push(',');
        }
        ddl.push_str("\n    ");
        ddl.push_str(&quote_ident(&column.name));
        ddl.push(' ');
        ddl.push_str(&column.type_name);
        if column.not_null {
            ddl.push_str(" NOT NULL");
        }
    }
    ddl.push_str("\n);");
    ddl
}

/// Resolves which config entry applies to each discovered table, honoring
/// `apply-for-inherited`.
fn assign_config<'a>(
    tables: &[DiscoveredTable],
    inheritance: &[discover::DiscoveredInheritance],
    config: &'a Config,
) -> Result<BTreeMap<u32, &'a TableConfig>> {
    let mut by_oid: BTreeMap<u32, &TableConfig> = BTreeMap::new();
    for entry in &config.dump.transformation {
        let table = tables
            .iter()
            .find(|t| t.schema == entry.schema && t.name == entry.name)
            .ok_or_else(|| {
                Error::Config(format!(
                    "dump.transformation names unknown table {}.{}",
                    entry.schema, entry.name
                ))
            })?;
        if by_oid.insert(table.oid, entry).is_some() {
            return Err(Error::Config(format!(
                "dump.transformation lists table {}.{} twice",
                entry.schema, entry.name
            )));
        }
        if entry.apply_for_inherited {
            for link in inheritance {
                if link.parent_oid == table.oid {
                    by_oid.entry(link.child_oid).or_insert(entry);
                }
            }
        }
    }
    Ok(by_oid)
}

/// Synthesizes subset filter queries and returns them keyed by table OID.
fn plan_subsets(
    tables: &[DiscoveredTable],
    foreign_keys: &[discover::DiscoveredForeignKey],
    assigned: &BTreeMap<u32, &TableConfig>,
    config: &Config,
) -> Result<(BTreeMap<u32, String>, Vec<u32>)> {
    let seeds: Vec<(u32, &str)> = assigned
        .iter()
        .filter_map(|(oid, entry)| {
            entry.subset_condition.as_deref().map(|condition| (*oid, condition))
        })
        .collect();
    if seeds.is_empty() {
        return Ok((BTreeMap::new(), Vec::new()));
    }

    let mut graph = FkGraph::new();
    let mut node_by_oid: BTreeMap<u32, usize> = BTreeMap::new();
    let mut oid_by_node: Vec<u32> = Vec::new();
    for table in tables {
        let node = graph.add_table(TableNode::new(
            table.schema.clone(),
            table.name.clone(),
            table.primary_key.clone(),
        ));
        node_by_oid.insert(table.oid, node);
        oid_by_node.push(table.oid);
    }
    for fk in foreign_keys {
        let (Some(&child), Some(&parent)) =
            (node_by_oid.get(&fk.child_oid), node_by_oid.get(&fk.parent_oid))
        else {
            continue;
        };
        graph.add_foreign_key(
            child,
            parent,
            fk.child_columns.clone(),
            fk.parent_columns.clone(),
        )?;
    }

    let options = SubsetOptions { max_iterations: config.subset.max_iterations };
    let mut queries: BTreeMap<u32, String> = BTreeMap::new();
    let mut reachable: Vec<u32> = Vec::new();
    let mut claimed_components: Vec<(Vec<usize>, u32)> = Vec::new();

    for (seed_oid, condition) in seeds {
        let seed_node = node_by_oid[&seed_oid];
        let plan = build_subset_plan(&graph, seed_node, condition, &options)?;
        for (component, prior_seed) in &claimed_components {
            if component.contains(&seed_node) {
                let prior = tables
                    .iter()
                    .find(|t| t.oid == *prior_seed)
                    .map(|t| format!("{}.{}", t.schema, t.name))
                    .unwrap_or_default();
                return Err(Error::Config(format!(
                    "two subset conditions share one foreign-key component (first seed: {prior})"
                )));
            }
        }
        if !plan.cycles.is_empty() {
            info!(
                cycles = plan.cycles.len(),
                "foreign-key cycles detected in subset component"
            );
        }
        for query in &plan.queries {
            let oid = oid_by_node[query.node];
            let entry = assigned.get(&oid);
            if entry.and_then(|e| e.query.as_ref()).is_some() && oid != seed_oid {
                return Err(Error::Config(format!(
                    "table {} has both an explicit query and a subset filter",
                    graph.node(query.node).map(|n| n.label()).unwrap_or_default()
                )));
            }
            queries.insert(oid, query.sql.clone());
            reachable.push(oid);
        }
        claimed_components.push((plan.component, seed_oid));
    }
    Ok((queries, reachable))
}

/// Detects two transformers writing the same column of one table.
fn check_conflicting_writers(
    task: &TableTask,
    entry: Option<&&TableConfig>,
    bound: &[BoundTransformer],
    warnings: &mut Vec<ValidationWarning>,
) {
    let ordered = entry.map(|e| e.transformers_ordered).unwrap_or(false);
    if ordered {
        return;
    }
    for (i, first) in bound.iter().enumerate() {
        for second in &bound[i + 1..] {
            let overlap: Vec<usize> = first
                .affected
                .iter()
                .copied()
                .filter(|idx| second.affected.contains(idx))
                .collect();
            if let Some(&column_idx) = overlap.first() {
                let column = task
                    .columns
                    .get(column_idx)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| column_idx.to_string());
                warnings.push(
                    ValidationWarning::error()
                        .with_msg(
                            "two transformers write the same column; set transformers-ordered \
                             to allow chaining",
                        )
                        .with_meta("schema", task.schema.clone())
                        .with_meta("table", task.name.clone())
                        .with_meta("column", column)
                        .with_meta("first", first.name.clone())
                        .with_meta("second", second.name.clone()),
                );
            }
        }
    }
}

/// Builds the dump plan: discovery, subset synthesis, transformer
/// validation, dump-id assignment, and TOC construction.
///
/// # Errors
///
/// Returns [`Error::Config`] for config referencing unknown objects,
/// [`Error::Database`] for introspection failures, and subset errors for
/// unsatisfiable subset configs. Validation problems are reported through
/// `DumpPlan::warnings`, not as errors.
pub fn build_plan(
    conn: &mut dyn DbConn,
    config: &Config,
    registry: &TransformerRegistry,
) -> Result<DumpPlan> {
    let tables = discover::discover_tables(conn)?;
    let foreign_keys = discover::discover_foreign_keys(conn)?;
    let sequences = discover::discover_sequences(conn)?;
    let indexes = discover::discover_indexes(conn)?;
    let inheritance = discover::discover_inheritance(conn)?;
    debug!(
        tables = tables.len(),
        foreign_keys = foreign_keys.len(),
        sequences = sequences.len(),
        indexes = indexes.len(),
        "catalog discovered"
    );

    let assigned = assign_config(&tables, &inheritance, config)?;
    let (subset_queries, reachable) = plan_subsets(&tables, &foreign_keys, &assigned, config)?;
    let has_seeds = !subset_queries.is_empty();

    let sequence = DumpSequence::new(0);
    let mut toc = Toc::default();
    let mut tasks = Vec::new();
    let mut warnings = Vec::new();

    // Pre-data: schemas.
    let mut schema_ids: BTreeMap<String, DumpId> = BTreeMap::new();
    let mut schemas: Vec<&str> = tables.iter().map(|t| t.schema.as_str()).collect();
    schemas.extend(sequences.iter().map(|s| s.schema.as_str()));
    schemas.sort_unstable();
    schemas.dedup();
    for schema in schemas {
        let mut entry = Entry::new(sequence.next(), Section::PreData);
        entry.tag = Some(schema.to_owned());
        entry.desc = Some(desc::SCHEMA.to_owned());
        entry.defn = Some(format!("CREATE SCHEMA {};", quote_ident(schema)));
        entry.drop_stmt = Some(format!("DROP SCHEMA {};", quote_ident(schema)));
        schema_ids.insert(schema.to_owned(), entry.dump_id);
        toc.entries.push(entry);
    }

    // Pre-data: sequences, DDL plus their setval call. There is no
    // sequence stream in the data section.
    for seq in &sequences {
        let mut create = Entry::new(sequence.next(), Section::PreData);
        create.tag = Some(seq.name.clone());
        create.desc = Some(desc::SEQUENCE.to_owned());
        create.namespace = Some(seq.schema.clone());
        create.defn = Some(format!(
            "CREATE SEQUENCE {}.{};",
            quote_ident(&seq.schema),
            quote_ident(&seq.name)
        ));
        create.drop_stmt = Some(format!(
            "DROP SEQUENCE {}.{};",
            quote_ident(&seq.schema),
            quote_ident(&seq.name)
        ));
        if let Some(&schema_id) = schema_ids.get(&seq.schema) {
            create.dependencies.push(schema_id);
        }
        let create_id = create.dump_id;
        toc.entries.push(create);

        let mut set = Entry::new(sequence.next(), Section::PreData);
        set.tag = Some(seq.name.clone());
        set.desc = Some(desc::SEQUENCE_SET.to_owned());
        set.namespace = Some(seq.schema.clone());
        set.defn = Some(format!(
            "SELECT pg_catalog.setval('{}.{}', {}, {});",
            quote_ident(&seq.schema),
            quote_ident(&seq.name),
            seq.last_value,
            seq.is_called
        ));
        set.dependencies.push(create_id);
        toc.entries.push(set);
    }

    // Pre-data: tables.
    let mut table_ids: BTreeMap<u32, DumpId> = BTreeMap::new();
    for table in &tables {
        let mut entry = Entry::new(sequence.next(), Section::PreData);
        entry.tag = Some(table.name.clone());
        entry.desc = Some(desc::TABLE.to_owned());
        entry.namespace = Some(table.schema.clone());
        entry.table_oid = Some(table.oid.to_string());
        entry.defn = Some(table_ddl(table));
        entry.drop_stmt = Some(format!(
            "DROP TABLE {}.{};",
            quote_ident(&table.schema),
            quote_ident(&table.name)
        ));
        if let Some(&schema_id) = schema_ids.get(&table.schema) {
            entry.dependencies.push(schema_id);
        }
        table_ids.insert(table.oid, entry.dump_id);
        toc.entries.push(entry);
    }

    // Data: one TABLE DATA entry and task per dumped table.
    let mut data_ids: BTreeMap<u32, DumpId> = BTreeMap::new();
    for table in &tables {
        if has_seeds && config.subset.exclude_unreachable && !reachable.contains(&table.oid) {
            debug!(table = %format!("{}.{}", table.schema, table.name), "outside every subset component; data excluded");
            continue;
        }
        let entry_config = assigned.get(&table.oid);
        let mut task = TableTask {
            dump_id: sequence.next(),
            oid: table.oid,
            schema: table.schema.clone(),
            name: table.name.clone(),
            columns: table.columns.clone(),
            primary_key: table.primary_key.clone(),
            size_bytes: table.size_bytes,
            transformers: entry_config.map(|e| e.transformers.clone()).unwrap_or_default(),
            query: None,
            validate_limited_records: None,
        };
        task.query = match (entry_config.and_then(|e| e.query.clone()), subset_queries.get(&table.oid)) {
            (Some(query), None) => Some(query),
            (None, Some(subset)) => Some(subset.clone()),
            (None, None) => None,
            (Some(_), Some(_)) => {
                return Err(Error::Config(format!(
                    "table {}.{} has both an explicit query and a subset filter",
                    table.schema, table.name
                )))
            }
        };

        let (bound, mut batch) = task.bind_transformers(registry)?;
        check_conflicting_writers(&task, entry_config, &bound, &mut batch);
        warnings.append(&mut batch);
        drop(bound);

        let mut entry = Entry::new(task.dump_id, Section::Data);
        entry.tag = Some(table.name.clone());
        entry.desc = Some(desc::TABLE_DATA.to_owned());
        entry.namespace = Some(table.schema.clone());
        entry.table_oid = Some(table.oid.to_string());
        entry.had_dumper = true;
        entry.copy_stmt = Some(task.copy_in_sql());
        entry.file_name = Some(task.data_file_name());
        if let Some(&table_id) = table_ids.get(&table.oid) {
            entry.dependencies.push(table_id);
        }
        data_ids.insert(table.oid, entry.dump_id);
        toc.entries.push(entry);
        tasks.push(task);
    }

    // Post-data: secondary indexes.
    for index in &indexes {
        let Some(table) =
            tables.iter().find(|t| t.schema == index.schema && t.name == index.table)
        else {
            continue;
        };
        let mut entry = Entry::new(sequence.next(), Section::PostData);
        entry.tag = Some(index.name.clone());
        entry.desc = Some(desc::INDEX.to_owned());
        entry.namespace = Some(index.schema.clone());
        entry.defn = Some(format!("{};", index.definition.trim_end_matches(';')));
        entry.drop_stmt = Some(format!(
            "DROP INDEX {}.{};",
            quote_ident(&index.schema),
            quote_ident(&index.name)
        ));
        if let Some(&table_id) = table_ids.get(&table.oid) {
            entry.dependencies.push(table_id);
        }
        toc.entries.push(entry);
    }

    // Post-data: foreign keys, depending on both tables' data so restore
    // adds the constraint only after the rows exist on each side.
    for fk in &foreign_keys {
        let Some(child) = tables.iter().find(|t| t.oid == fk.child_oid) else { continue };
        let mut entry = Entry::new(sequence.next(), Section::PostData);
        entry.tag = Some(fk.constraint.clone());
        entry.desc = Some(desc::FK_CONSTRAINT.to_owned());
        entry.namespace = Some(child.schema.clone());
        entry.defn = Some(format!(
            "ALTER TABLE {}.{} ADD CONSTRAINT {} {};",
            quote_ident(&child.schema),
            quote_ident(&child.name),
            quote_ident(&fk.constraint),
            fk.definition
        ));
        entry.drop_stmt = Some(format!(
            "ALTER TABLE {}.{} DROP CONSTRAINT {};",
            quote_ident(&child.schema),
            quote_ident(&child.name),
            quote_ident(&fk.constraint)
        ));
        for oid in [fk.child_oid, fk.parent_oid] {
            if let Some(&data_id) = data_ids.get(&oid) {
                entry.dependencies.push(data_id);
            } else if let Some(&table_id) = table_ids.get(&oid) {
                entry.dependencies.push(table_id);
            }
        }
        entry.dependencies.sort_unstable();
        entry.dependencies.dedup();
        toc.entries.push(entry);
    }

    toc.validate()?;
    Ok(DumpPlan { toc, tables: tasks, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockDb;
    use crate::db::Connector;

    fn scripted_db() -> MockDb {
        let db = MockDb::new();
        db.add_query_result(
            "relkind = 'r'",
            vec![
                vec![
                    Some("100".into()),
                    Some("public".into()),
                    Some("orders".into()),
                    Some("4096".into()),
                ],
                vec![
                    Some("101".into()),
                    Some("public".into()),
                    Some("users".into()),
                    Some("8192".into()),
                ],
            ],
        );
        db.add_query_result(
            "a.attrelid = 100",
            vec![
                vec![Some("id".into()), Some("23".into()), Some("integer".into()), Some("t".into()), Some("-1".into())],
                vec![Some("user_id".into()), Some("23".into()), Some("integer".into()), Some("f".into()), Some("-1".into())],
            ],
        );
        db.add_query_result(
            "a.attrelid = 101",
            vec![
                vec![Some("id".into()), Some("23".into()), Some("integer".into()), Some("t".into()), Some("-1".into())],
                vec![Some("email".into()), Some("25".into()), Some("text".into()), Some("f".into()), Some("-1".into())],
            ],
        );
        db.add_query_result("i.indrelid = 100", vec![vec![Some("id".into())]]);
        db.add_query_result("i.indrelid = 101", vec![vec![Some("id".into())]]);
        db.add_query_result(
            "contype = 'f'",
            vec![vec![
                Some("orders_user_fk".into()),
                Some("100".into()),
                Some("101".into()),
                Some("user_id".into()),
                Some("id".into()),
                Some("FOREIGN KEY (user_id) REFERENCES users(id)".into()),
            ]],
        );
        db
    }

    fn config_with(entries: Vec<TableConfig>) -> Config {
        let mut config = Config::default();
        config.dump.transformation = entries;
        config
    }

    #[test]
    fn plan_has_dense_ids_and_sections() {
        let db = scripted_db();
        let mut conn = db.connect().unwrap();
        let registry = TransformerRegistry::with_builtins();
        let plan = build_plan(conn.as_mut(), &Config::default(), &registry).unwrap();

        plan.toc.validate().unwrap();
        assert_eq!(plan.tables.len(), 2);
        // schema, 2 tables, 2 table data, 1 fk constraint
        assert_eq!(plan.toc.entries.len(), 6);
        let fk = plan
            .toc
            .entries
            .iter()
            .find(|e| e.desc.as_deref() == Some(desc::FK_CONSTRAINT))
            .unwrap();
        assert_eq!(fk.section, Section::PostData);
        // Depends on both table data entries.
        assert_eq!(fk.dependencies.len(), 2);
    }

    #[test]
    fn unknown_config_table_is_config_error() {
        let db = scripted_db();
        let mut conn = db.connect().unwrap();
        let registry = TransformerRegistry::with_builtins();
        let config = config_with(vec![TableConfig {
            schema: "public".into(),
            name: "missing".into(),
            ..Default::default()
        }]);
        let err = build_plan(conn.as_mut(), &config, &registry).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn transformer_type_mismatch_surfaces_as_fatal_warning() {
        let db = scripted_db();
        let mut conn = db.connect().unwrap();
        let registry = TransformerRegistry::with_builtins();
        let config = config_with(vec![TableConfig {
            schema: "public".into(),
            name: "users".into(),
            transformers: vec![TransformerUse {
                name: "masking".into(),
                params: [("column".to_owned(), serde_json::Value::from("id"))]
                    .into_iter()
                    .collect(),
            }],
            ..Default::default()
        }]);
        let plan = build_plan(conn.as_mut(), &config, &registry).unwrap();
        assert!(veildump_core::is_fatal(&plan.warnings));
    }

    #[test]
    fn conflicting_writers_detected_unless_ordered() {
        let transformer = |value: &str| TransformerUse {
            name: "replace".into(),
            params: [
                ("column".to_owned(), serde_json::Value::from("email")),
                ("value".to_owned(), serde_json::Value::from(value)),
            ]
            .into_iter()
            .collect(),
        };
        let registry = TransformerRegistry::with_builtins();

        let db = scripted_db();
        let mut conn = db.connect().unwrap();
        let config = config_with(vec![TableConfig {
            schema: "public".into(),
            name: "users".into(),
            transformers: vec![transformer("a"), transformer("b")],
            ..Default::default()
        }]);
        let plan = build_plan(conn.as_mut(), &config, &registry).unwrap();
        assert!(plan.warnings.iter().any(|w| w.msg.contains("same column")));
        assert!(veildump_core::is_fatal(&plan.warnings));

        let db = scripted_db();
        let mut conn = db.connect().unwrap();
        let config = config_with(vec![TableConfig {
            schema: "public".into(),
            name: "users".into(),
            transformers_ordered: true,
            transformers: vec![transformer("a"), transformer("b")],
            ..Default::default()
        }]);
        let plan = build_plan(conn.as_mut(), &config, &registry).unwrap();
        assert!(!veildump_core::is_fatal(&plan.warnings));
    }

    #[test]
    fn subset_condition_filters_component_tables() {
        let db = scripted_db();
        let mut conn = db.connect().unwrap();
        let registry = TransformerRegistry::with_builtins();
        let config = config_with(vec![TableConfig {
            schema: "public".into(),
            name: "users".into(),
            subset_condition: Some("s.\"id\" < 10".into()),
            ..Default::default()
        }]);
        let plan = build_plan(conn.as_mut(), &config, &registry).unwrap();
        for task in &plan.tables {
            let query = task.query.as_deref().unwrap();
            assert!(query.starts_with("WITH RECURSIVE reachable"));
        }
    }

    #[test]
    fn copy_out_sql_wraps_limit() {
        let db = scripted_db();
        let mut conn = db.connect().unwrap();
        let registry = TransformerRegistry::with_builtins();
        let plan = build_plan(conn.as_mut(), &Config::default(), &registry).unwrap();
        let mut task = plan.tables[0].clone();
        assert!(task.copy_out_sql().starts_with("COPY (SELECT "));
        task.validate_limited_records = Some(5);
        assert!(task.copy_out_sql().contains("LIMIT 5"));
        assert!(task.copy_out_sql().ends_with("TO STDOUT"));
    }
}
