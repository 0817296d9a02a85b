//! The dependency tree handed to and returned by the resolver.
//!
//! A node names a target table, the foreign-key constraint that produced
//! the edge to it (`None` at the root), and whether its rows should be
//! fetched. Mandatory edges point toward referenced (parent) tables and
//! are required for the referential validity of a selected row; optional
//! edges point toward referencing (child) tables and merely extend the
//! extracted set.
//!
//! Invariant: a constraint name appears at most once across a resolved
//! tree, which both caps the traversal and makes cyclic FK graphs safe.

use crate::table_name::TableName;

/// A literal `column = value` filter attached to a dependency node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    column: String,
    value: String,
}

impl QueryFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// One node of the dependency tree.
#[derive(Debug, Clone)]
pub struct Dependency {
    table: TableName,
    constraint_name: Option<String>,
    selected: bool,
    mandatory: bool,
    filters: Vec<QueryFilter>,
    dependencies: Vec<Dependency>,
}

impl Dependency {
    /// The root of an extraction request.
    pub fn root(table: TableName) -> Self {
        Self {
            table,
            constraint_name: None,
            selected: true,
            mandatory: true,
            filters: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// A node reached through the named foreign-key constraint.
    pub fn edge(table: TableName, constraint_name: impl Into<String>, mandatory: bool) -> Self {
        Self {
            table,
            constraint_name: Some(constraint_name.into()),
            selected: true,
            mandatory,
            filters: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<QueryFilter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn constraint_name(&self) -> Option<&str> {
        self.constraint_name.as_deref()
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    pub fn mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn set_mandatory(&mut self, mandatory: bool) {
        self.mandatory = mandatory;
    }

    pub fn filters(&self) -> &[QueryFilter] {
        &self.filters
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn set_dependencies(&mut self, dependencies: Vec<Dependency>) {
        self.dependencies = dependencies;
    }

    /// Detach the sub-dependency produced by the named constraint, if the
    /// caller's partial tree already carried one. Lets user-specified
    /// selection and filters survive re-resolution.
    pub fn take_dependency(&mut self, constraint_name: &str) -> Option<Dependency> {
        let position = self
            .dependencies
            .iter()
            .position(|d| d.constraint_name() == Some(constraint_name))?;
        Some(self.dependencies.remove(position))
    }

    /// Every constraint name in this subtree, in depth-first order.
    pub fn constraint_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_constraint_names(&mut names);
        names
    }

    fn collect_constraint_names(&self, names: &mut Vec<String>) {
        if let Some(name) = self.constraint_name() {
            names.push(name.to_string());
        }
        for dependency in &self.dependencies {
            dependency.collect_constraint_names(names);
        }
    }
}
