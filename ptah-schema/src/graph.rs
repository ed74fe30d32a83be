//! Foreign key dependency resolution.
//!
//! Tables are ordered so that every table comes after the tables it
//! references. Ties keep declaration order. Self references never block a
//! table. Cycles between two or more tables are found explicitly (Tarjan's
//! strongly connected components); the foreign keys on edges inside a cycle
//! are reported as deferred so generators can add them with
//! `ALTER TABLE ... ADD CONSTRAINT` once every table exists.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A dependency edge whose foreign key must be added after table creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeferredEdge {
    /// The referencing table.
    pub table: String,
    /// The referenced table.
    pub references: String,
}

/// Result of ordering a set of tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Every table exactly once, dependencies first.
    pub order: Vec<String>,
    /// Each cycle of two or more tables, in declaration order.
    pub cycles: Vec<Vec<String>>,
    /// Edges whose foreign keys are deferred to break cycles.
    pub deferred: Vec<DeferredEdge>,
    /// `(table, referenced)` pairs naming tables outside the model.
    pub unresolved: Vec<(String, String)>,
}

impl Resolution {
    /// Whether the foreign key from `table` to `references` is deferred.
    pub fn is_deferred(&self, table: &str, references: &str) -> bool {
        self.deferred
            .iter()
            .any(|e| e.table == table && e.references == references)
    }

    /// Whether any cycle was found.
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Order `tables` using the `dependencies` map.
///
/// Tables missing from the map are treated as having no dependencies.
pub fn resolve<'a>(
    tables: impl IntoIterator<Item = &'a str>,
    dependencies: &IndexMap<String, Vec<String>>,
) -> Resolution {
    let names: Vec<&str> = {
        let mut seen = HashSet::new();
        tables.into_iter().filter(|t| seen.insert(*t)).collect()
    };
    let position: IndexMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let mut resolution = Resolution::default();

    // Adjacency by position, self edges and unknown targets removed.
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    for (i, name) in names.iter().enumerate() {
        for dep in dependencies.get(*name).into_iter().flatten() {
            if dep == name {
                continue;
            }
            match position.get(dep.as_str()) {
                Some(&j) if !edges[i].contains(&j) => edges[i].push(j),
                Some(_) => {}
                None => {
                    warn!(table = %name, references = %dep, "reference to undeclared table");
                    resolution
                        .unresolved
                        .push((name.to_string(), dep.clone()));
                }
            }
        }
    }

    let mut component_of = vec![usize::MAX; names.len()];
    for (c, mut component) in strongly_connected(&edges).into_iter().enumerate() {
        for &v in &component {
            component_of[v] = c;
        }
        if component.len() > 1 {
            component.sort_unstable();
            let cycle: Vec<String> = component.iter().map(|&v| names[v].to_string()).collect();
            warn!(tables = ?cycle, "foreign key cycle; constraints will be deferred");
            resolution.cycles.push(cycle);
        }
    }
    resolution.cycles.sort_by_key(|cycle| {
        cycle
            .first()
            .and_then(|n| position.get(n.as_str()).copied())
    });

    let mut blocking: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    for (i, targets) in edges.iter().enumerate() {
        for &j in targets {
            if component_of[i] == component_of[j] {
                resolution.deferred.push(DeferredEdge {
                    table: names[i].to_string(),
                    references: names[j].to_string(),
                });
            } else {
                blocking[i].push(j);
            }
        }
    }

    let mut emitted = vec![false; names.len()];
    while resolution.order.len() < names.len() {
        let next = (0..names.len())
            .find(|&i| !emitted[i] && blocking[i].iter().all(|&j| emitted[j]));
        // Deferral removes every intra-cycle edge, so a ready table always exists.
        let Some(i) = next.or_else(|| (0..names.len()).find(|&i| !emitted[i])) else {
            break;
        };
        emitted[i] = true;
        resolution.order.push(names[i].to_string());
    }

    debug!(order = ?resolution.order, "resolved table order");
    resolution
}

/// Tarjan's algorithm with an explicit call stack, so long reference chains
/// cannot exhaust the thread stack. Returns components as lists of vertex
/// positions.
fn strongly_connected(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = edges.len();
    let mut counter = 0;
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut components = Vec::new();

    // (vertex, next edge to follow)
    let mut calls: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if index[root].is_some() {
            continue;
        }
        calls.push((root, 0));

        while let Some(&(v, next)) = calls.last() {
            if next == 0 && index[v].is_none() {
                index[v] = Some(counter);
                lowlink[v] = counter;
                counter += 1;
                stack.push(v);
                on_stack[v] = true;
            }

            if let Some(&w) = edges[v].get(next) {
                let top = calls.len() - 1;
                calls[top].1 += 1;
                match index[w] {
                    None => calls.push((w, 0)),
                    Some(w_index) if on_stack[w] => lowlink[v] = lowlink[v].min(w_index),
                    Some(_) => {}
                }
                continue;
            }

            calls.pop();
            if let Some(&(parent, _)) = calls.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if Some(lowlink[v]) == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    components
}
