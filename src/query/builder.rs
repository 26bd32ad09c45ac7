//! Parameterized filter-query construction
//!
//! [`QueryBuilder`] turns a [`SearchFilter`] into a query template plus the
//! named parameters to bind with it. Filter values only ever appear in the
//! parameter map; property keys appear in the template, which is why they
//! are [`PropertyKey`]s.
//!
//! ```text
//! MATCH (fnode:FileNode)
//! WHERE NOT fnode:SchemaDefinition
//!   AND (toLower(fnode.file_path) STARTS WITH toLower($path0))
//!   AND toLower(toString(fnode.`company`)) CONTAINS toLower($prop_company)
//! RETURN fnode
//! ```

use super::filter::{PropertyKey, SearchFilter};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Renders the condition fragments of a filter for one query language.
///
/// Placeholders are `$name`; the builder decides the names.
pub trait FilterDialect {
    /// Condition excluding schema-definition records
    fn exclude_schema_definitions(&self) -> String;

    /// Case-insensitive "record path starts with `placeholder`"
    fn path_starts_with(&self, placeholder: &str) -> String;

    /// Case-insensitive "property `key` contains `placeholder`"
    fn property_contains(&self, key: &PropertyKey, placeholder: &str) -> String;

    /// Wrap the conjoined condition into a complete query
    fn wrap(&self, condition: &str) -> String;
}

/// Property-graph (Cypher) rendering
#[derive(Debug, Clone)]
pub struct CypherDialect {
    pub record_label: String,
    pub schema_label: String,
    pub variable: String,
}

impl Default for CypherDialect {
    fn default() -> Self {
        Self {
            record_label: "FileNode".to_string(),
            schema_label: "SchemaDefinition".to_string(),
            variable: "fnode".to_string(),
        }
    }
}

impl FilterDialect for CypherDialect {
    fn exclude_schema_definitions(&self) -> String {
        format!("NOT {}:{}", self.variable, self.schema_label)
    }

    fn path_starts_with(&self, placeholder: &str) -> String {
        format!(
            "toLower({}.file_path) STARTS WITH toLower({})",
            self.variable, placeholder
        )
    }

    fn property_contains(&self, key: &PropertyKey, placeholder: &str) -> String {
        format!(
            "toLower(toString({}.`{}`)) CONTAINS toLower({})",
            self.variable, key, placeholder
        )
    }

    fn wrap(&self, condition: &str) -> String {
        format!(
            "MATCH ({}:{})\nWHERE {}\nRETURN {}",
            self.variable, self.record_label, condition, self.variable
        )
    }
}

/// Name of the SQL function [`SqliteDialect`] folds case with.
///
/// SQLite's built-in `lower()` only folds ASCII, so the executing
/// connection must register this as a Unicode lowercase.
pub const FOLD_CASE_FUNCTION: &str = "fold_case";

/// SQLite rendering over a table holding one JSON search document per row
#[derive(Debug, Clone)]
pub struct SqliteDialect {
    pub table: String,
    pub columns: String,
    /// Column holding the record's search document: a flat JSON object of
    /// text values
    pub search_column: String,
    /// Integer column that is non-zero for schema-definition rows
    pub schema_marker_column: String,
}

impl Default for SqliteDialect {
    fn default() -> Self {
        Self {
            table: "file_nodes".to_string(),
            columns: "*".to_string(),
            search_column: "search_json".to_string(),
            schema_marker_column: "is_schema_definition".to_string(),
        }
    }
}

impl SqliteDialect {
    pub fn with_columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }
}

impl FilterDialect for SqliteDialect {
    fn exclude_schema_definitions(&self) -> String {
        format!("{} = 0", self.schema_marker_column)
    }

    fn path_starts_with(&self, placeholder: &str) -> String {
        format!(
            "instr({f}(file_path), {f}({p})) = 1",
            f = FOLD_CASE_FUNCTION,
            p = placeholder
        )
    }

    fn property_contains(&self, key: &PropertyKey, placeholder: &str) -> String {
        format!(
            "instr({f}(json_extract({}, '$.{}')), {f}({})) > 0",
            self.search_column,
            key,
            placeholder,
            f = FOLD_CASE_FUNCTION
        )
    }

    fn wrap(&self, condition: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} ORDER BY identifier",
            self.columns, self.table, condition
        )
    }
}

/// A query template and the parameters to bind with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterQuery {
    pub template: String,
    /// Parameter name (without `$`) to value, exactly as supplied
    pub params: BTreeMap<String, String>,
}

impl FilterQuery {
    /// The template with parameter values substituted as quoted literals.
    ///
    /// For display only; never execute the result.
    pub fn render_debug(&self) -> String {
        let mut names: Vec<&String> = self.params.keys().collect();
        // `$path10` must be replaced before `$path1`
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));

        let mut rendered = self.template.clone();
        for name in names {
            let literal = format!("'{}'", self.params[name].replace('\'', "''"));
            rendered = rendered.replace(&format!("${}", name), &literal);
        }
        rendered
    }
}

/// Builds parameterized filter queries. Pure; holds no state beyond its dialect.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder<D = CypherDialect> {
    dialect: D,
}

impl QueryBuilder<CypherDialect> {
    pub fn cypher() -> Self {
        Self::default()
    }
}

impl QueryBuilder<SqliteDialect> {
    pub fn sqlite() -> Self {
        Self::default()
    }
}

impl<D: FilterDialect> QueryBuilder<D> {
    pub fn new(dialect: D) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Build the query for `filter`.
    ///
    /// Path prefixes become one disjunction (`path0`, `path1`, ...), each
    /// property filter its own condition (`prop_<key>`); everything is
    /// conjoined with the schema-definition exclusion.
    pub fn build(&self, filter: &SearchFilter) -> FilterQuery {
        let mut conditions = vec![self.dialect.exclude_schema_definitions()];
        let mut params = BTreeMap::new();

        if !filter.paths.is_empty() {
            let alternatives: Vec<String> = filter
                .paths
                .iter()
                .enumerate()
                .map(|(i, prefix)| {
                    let name = format!("path{}", i);
                    let condition = self.dialect.path_starts_with(&format!("${}", name));
                    params.insert(name, prefix.clone());
                    condition
                })
                .collect();
            conditions.push(format!("({})", alternatives.join(" OR ")));
        }

        for (key, value) in &filter.properties {
            let name = format!("prop_{}", key);
            conditions.push(self.dialect.property_contains(key, &format!("${}", name)));
            params.insert(name, value.clone());
        }

        let template = self.dialect.wrap(&conditions.join(" AND "));
        debug!(params = params.len(), "filter query built");
        FilterQuery { template, params }
    }

    /// Convenience form taking prefixes and raw property filters
    pub fn build_from<I, S>(
        &self,
        paths: I,
        properties: &BTreeMap<String, String>,
    ) -> super::QueryResult<FilterQuery>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = SearchFilter::new().with_paths(paths);
        for (key, value) in properties {
            filter = filter.with_property(key, value.clone())?;
        }
        Ok(self.build(&filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_path_and_one_property_give_two_params() {
        let mut properties = BTreeMap::new();
        properties.insert("company".to_string(), "Toyota".to_string());
        let query = QueryBuilder::cypher()
            .build_from(["C:\\Users\\x\\"], &properties)
            .unwrap();

        assert_eq!(query.template.matches("STARTS WITH").count(), 1);
        assert_eq!(query.template.matches("CONTAINS").count(), 1);
        assert_eq!(query.params.len(), 2);
        assert_eq!(query.params["path0"], "C:\\Users\\x\\");
        assert_eq!(query.params["prop_company"], "Toyota");
        assert!(!query.template.contains("Toyota"));
        assert!(!query.template.contains("Users"));
    }

    #[test]
    fn cypher_template_shape() {
        let filter = SearchFilter::new()
            .with_paths(["/a/", "/b/"])
            .with_property("company", "x")
            .unwrap();
        let query = QueryBuilder::cypher().build(&filter);

        assert_eq!(
            query.template,
            "MATCH (fnode:FileNode)\n\
             WHERE NOT fnode:SchemaDefinition AND \
             (toLower(fnode.file_path) STARTS WITH toLower($path0) OR \
             toLower(fnode.file_path) STARTS WITH toLower($path1)) AND \
             toLower(toString(fnode.`company`)) CONTAINS toLower($prop_company)\n\
             RETURN fnode"
        );
    }

    #[test]
    fn empty_filter_still_excludes_schemas() {
        let query = QueryBuilder::cypher().build(&SearchFilter::new());
        assert!(query.params.is_empty());
        assert!(query.template.contains("NOT fnode:SchemaDefinition"));

        let sql = QueryBuilder::sqlite().build(&SearchFilter::new());
        assert_eq!(
            sql.template,
            "SELECT * FROM file_nodes WHERE is_schema_definition = 0 ORDER BY identifier"
        );
    }

    #[test]
    fn sqlite_dialect_binds_the_same_params() {
        let filter = SearchFilter::new()
            .with_path("/scans/")
            .with_property("company", "it's")
            .unwrap();
        let cypher = QueryBuilder::cypher().build(&filter);
        let sql = QueryBuilder::sqlite().build(&filter);

        assert_eq!(cypher.params, sql.params);
        assert!(sql
            .template
            .contains("fold_case(json_extract(search_json, '$.company'))"));
        assert!(sql.template.contains("instr(fold_case(file_path), fold_case($path0)) = 1"));
        assert!(!sql.template.contains("lower("));
    }

    #[test]
    fn invalid_key_is_rejected_before_building() {
        let mut properties = BTreeMap::new();
        properties.insert("x`) DETACH DELETE fnode //".to_string(), "v".to_string());
        assert!(QueryBuilder::cypher()
            .build_from(Vec::<String>::new(), &properties)
            .is_err());
    }

    #[test]
    fn debug_rendering_substitutes_longest_names_first() {
        let paths: Vec<String> = (0..11).map(|i| format!("/p{}/", i)).collect();
        let filter = SearchFilter::new()
            .with_paths(paths)
            .with_property("company", "O'Hara")
            .unwrap();
        let rendered = QueryBuilder::cypher().build(&filter).render_debug();

        assert!(rendered.contains("toLower('/p10/')"));
        assert!(rendered.contains("toLower('/p1/')"));
        assert!(rendered.contains("toLower('O''Hara')"));
        assert!(!rendered.contains('$'));
    }
}
