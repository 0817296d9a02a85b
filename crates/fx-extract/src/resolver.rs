//! Foreign-key dependency resolution.
//!
//! Extends a possibly partial [`Dependency`] tree with every FK edge not
//! yet represented, walking both toward referenced (parent) tables and
//! toward referencing (child) tables. A constraint visited anywhere in the
//! traversal is never revisited, which caps the recursion at the number of
//! distinct FK constraints in the schema and makes cyclic FK graphs safe.

use crate::error::ExtractResult;
use async_recursion::async_recursion;
use fx_core::Dependency;
use fx_db::Catalog;
use std::collections::HashSet;

/// Resolve the full dependency tree rooted at `root`.
///
/// Sub-dependencies already present in the caller's tree take precedence
/// over synthesized placeholders, so user-specified selection flags and
/// filters survive re-resolution. Nodes marked `selected = false` are not
/// descended into.
pub async fn resolve(catalog: &dyn Catalog, root: Dependency) -> ExtractResult<Dependency> {
    let mut visited = HashSet::new();
    resolve_node(catalog, root, &mut visited).await
}

#[async_recursion]
async fn resolve_node(
    catalog: &dyn Catalog,
    mut node: Dependency,
    visited: &mut HashSet<String>,
) -> ExtractResult<Dependency> {
    if !node.selected() {
        return Ok(node);
    }

    let table = catalog.table(node.table()).await?;
    let mut resolved = Vec::new();

    // Edges toward referenced (parent) tables: required for the FK
    // validity of a selected row.
    for fk in table.foreign_keys() {
        if !visited.insert(fk.name().to_string()) {
            continue;
        }
        let mut child = node
            .take_dependency(fk.name())
            .unwrap_or_else(|| Dependency::edge(fk.pk_table().clone(), fk.name(), true));
        child.set_mandatory(true);
        resolved.push(resolve_node(catalog, child, visited).await?);
    }

    // Edges toward referencing (child) tables: optional, they extend the
    // dataset but are not required for referential validity.
    for fk in catalog.referencing_foreign_keys(node.table()).await? {
        if !visited.insert(fk.name().to_string()) {
            continue;
        }
        let mut child = node
            .take_dependency(fk.name())
            .unwrap_or_else(|| Dependency::edge(fk.fk_table().clone(), fk.name(), false));
        child.set_mandatory(false);
        resolved.push(resolve_node(catalog, child, visited).await?);
    }

    // Anything left in the caller's tree names a constraint that was
    // consumed elsewhere in the traversal or no longer exists.
    for stale in node.dependencies() {
        log::debug!(
            "dropping dependency on {} via {:?}: constraint already resolved or unknown",
            stale.table().qualified_name(),
            stale.constraint_name()
        );
    }
    node.set_dependencies(resolved);
    Ok(node)
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod resolver_test;
