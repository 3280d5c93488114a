// Complex reference processing
//
//  Copyright (C) 2014-2022 Ryan Specialty Group, LLC.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Materialization of complex references into output rows.
//!
//! Component groups are flattened first:
//!   a feature or module containing a group contains every component
//!   (and merge module) of that group,
//!     recursively.
//! Groups that contain one another form a cycle,
//!   which is an error;
//!     cycles are found using Tarjan's algorithm over the group graph.
//!
//! The resulting edges then produce rows:
//!
//!   - Feature → Component yields a `FeatureComponents` row,
//!       and the feature becomes a candidate for the component's
//!       _primary feature_;
//!   - Module → Component yields a `ModuleComponents` row;
//!   - Feature → Feature sets `Feature.Feature_Parent`;
//!   - Feature → Module sets `WixMerge.Feature_` and connects the merge
//!       module to the feature.
//!
//! A component may have at most one explicitly primary feature;
//!   absent an explicit primary,
//!     the first feature containing the component is primary.
//! Feature backlinks are then resolved through the primary feature of
//!   their component.

use super::{LinkError, Output};
use crate::diagnose::Messages;
use crate::row::{FieldData, Row, RowCounter};
use crate::schema::TableDefinitionCollection;
use crate::span::SourceLineNumberCollection;
use crate::sym::{
    ComplexReference, ComplexReferenceChildType as Child,
    ComplexReferenceParentType as Parent, FeatureBacklink,
};
use fxhash::{FxHashMap, FxHashSet};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

type Located<T> = (T, Option<SourceLineNumberCollection>);

/// A containment edge after component groups have been flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    parent_type: Parent,
    parent: String,
    parent_language: Option<String>,
    child_type: Child,
    child: String,
    primary: bool,
}

impl From<&ComplexReference> for Edge {
    fn from(cref: &ComplexReference) -> Self {
        Self {
            parent_type: cref.parent_type(),
            parent: cref.parent().into(),
            parent_language: cref.parent_language().map(String::from),
            child_type: cref.child_type(),
            child: cref.child().into(),
            primary: cref.is_primary(),
        }
    }
}

/// Leaf children of component groups,
///   computed lazily.
struct GroupIndex {
    children: FxHashMap<String, Vec<Located<Edge>>>,
    cyclic: FxHashSet<String>,
    memo: FxHashMap<String, Vec<Located<Edge>>>,
}

impl GroupIndex {
    fn new(crefs: &[Located<ComplexReference>], messages: &mut Messages) -> Self {
        let mut children: FxHashMap<String, Vec<Located<Edge>>> = Default::default();
        let mut graph = DiGraph::<String, ()>::new();
        let mut nodes: FxHashMap<String, NodeIndex> = Default::default();

        let mut node = |graph: &mut DiGraph<String, ()>, name: &str| {
            *nodes
                .entry(name.into())
                .or_insert_with(|| graph.add_node(name.into()))
        };

        for (cref, sources) in crefs {
            if cref.parent_type() != Parent::ComponentGroup {
                continue;
            }

            children
                .entry(cref.parent().into())
                .or_default()
                .push((cref.into(), sources.clone()));

            if cref.child_type() == Child::ComponentGroup {
                let from = node(&mut graph, cref.parent());
                let to = node(&mut graph, cref.child());
                graph.update_edge(from, to, ());
            }
        }

        let mut cyclic = FxHashSet::default();

        for scc in tarjan_scc(&graph) {
            let is_cycle = scc.len() > 1
                || scc.iter().any(|&n| graph.find_edge(n, n).is_some());

            if !is_cycle {
                continue;
            }

            let mut names: Vec<_> = scc.iter().map(|&n| graph[n].clone()).collect();
            names.sort();

            messages.emit(&LinkError::ComponentGroupCycle(names.clone()));
            cyclic.extend(names);
        }

        Self {
            children,
            cyclic,
            memo: Default::default(),
        }
    }

    /// Every non-group child of `group`,
    ///   with groups expanded recursively.
    fn leaves(&mut self, group: &str) -> Vec<Located<Edge>> {
        if self.cyclic.contains(group) {
            return vec![];
        }

        if let Some(leaves) = self.memo.get(group) {
            return leaves.clone();
        }

        let mut leaves = Vec::new();
        let children = self.children.get(group).cloned().unwrap_or_default();

        for (edge, sources) in children {
            match edge.child_type {
                Child::ComponentGroup => leaves.extend(self.leaves(&edge.child)),
                _ => leaves.push((edge, sources)),
            }
        }

        self.memo.insert(group.into(), leaves.clone());
        leaves
    }
}

/// Outcome of complex reference processing.
#[derive(Debug, Default)]
pub struct ComplexReferenceResult {
    /// Primary feature of each component contained by a feature.
    pub component_features: FxHashMap<String, String>,
}

/// Flatten complex references and materialize them as output rows.
pub fn process_complex_references(
    crefs: &[Located<ComplexReference>],
    output: &mut Output,
    defs: &TableDefinitionCollection,
    counter: &mut RowCounter,
    messages: &mut Messages,
) -> ComplexReferenceResult {
    let mut groups = GroupIndex::new(crefs, messages);
    let mut edges: Vec<Located<Edge>> = Vec::new();

    for (cref, sources) in crefs {
        match (cref.parent_type(), cref.child_type()) {
            (Parent::ComponentGroup, _) => continue,

            (parent_type, Child::ComponentGroup) => {
                for (leaf, leaf_sources) in groups.leaves(cref.child()) {
                    edges.push((
                        Edge {
                            parent_type,
                            parent: cref.parent().into(),
                            parent_language: cref.parent_language().map(String::from),
                            primary: cref.is_primary(),
                            ..leaf
                        },
                        leaf_sources,
                    ));
                }
            }

            _ => edges.push((cref.into(), sources.clone())),
        }
    }

    let edges = dedup_edges(edges);

    let mut result = ComplexReferenceResult::default();
    let mut explicit_primary: FxHashSet<String> = Default::default();
    let mut feature_parents: FxHashMap<String, String> = Default::default();
    let mut merge_primary: FxHashSet<String> = Default::default();

    for (edge, sources) in &edges {
        match (edge.parent_type, edge.child_type) {
            (Parent::Feature, Child::Component) => {
                add_row(
                    output,
                    defs,
                    counter,
                    "FeatureComponents",
                    &[Some(edge.parent.as_str().into()), Some(edge.child.as_str().into())],
                    sources,
                    messages,
                );

                let current = result.component_features.get(&edge.child).cloned();

                match (current, edge.primary) {
                    (None, primary) => {
                        result
                            .component_features
                            .insert(edge.child.clone(), edge.parent.clone());

                        if primary {
                            explicit_primary.insert(edge.child.clone());
                        }
                    }

                    (Some(first), true) if explicit_primary.contains(&edge.child) => {
                        messages.emit(&LinkError::MultiplePrimaryReferences {
                            component: edge.child.clone(),
                            first,
                            second: edge.parent.clone(),
                            sources: sources.clone(),
                        });
                    }

                    (Some(_), true) => {
                        result
                            .component_features
                            .insert(edge.child.clone(), edge.parent.clone());
                        explicit_primary.insert(edge.child.clone());
                    }

                    (Some(_), false) => (),
                }
            }

            (Parent::Module, Child::Component) => {
                let language = edge
                    .parent_language
                    .as_deref()
                    .and_then(|lang| lang.parse::<i64>().ok())
                    .unwrap_or(0);

                add_row(
                    output,
                    defs,
                    counter,
                    "ModuleComponents",
                    &[
                        Some(edge.child.as_str().into()),
                        Some(edge.parent.as_str().into()),
                        Some(FieldData::Number(language)),
                    ],
                    sources,
                    messages,
                );
            }

            (Parent::Feature, Child::Feature) => {
                match feature_parents.get(&edge.child) {
                    Some(first) if *first != edge.parent => {
                        messages.emit(&LinkError::MultipleFeatureParents {
                            feature: edge.child.clone(),
                            first: first.clone(),
                            second: edge.parent.clone(),
                            sources: sources.clone(),
                        });
                    }
                    Some(_) => (),
                    None => {
                        feature_parents.insert(edge.child.clone(), edge.parent.clone());
                        set_by_key(output, "Feature", &edge.child, 1, &edge.parent, messages);
                    }
                }
            }

            (Parent::Feature, Child::Module) => {
                output.connect_merge_feature(edge.child.as_str(), edge.parent.as_str());

                if edge.primary || !merge_primary.contains(&edge.child) {
                    merge_primary.insert(edge.child.clone());
                    set_by_key(output, "WixMerge", &edge.child, 7, &edge.parent, messages);
                }
            }

            // reachability only
            (Parent::Feature, Child::Fragment) | (Parent::Module, Child::Fragment) => (),

            _ => messages.emit(&LinkError::UnsupportedComplexReference {
                reference: format!(
                    "{} `{}` -> {} `{}`",
                    edge.parent_type, edge.parent, edge.child_type, edge.child
                ),
                sources: sources.clone(),
            }),
        }
    }

    result
}

/// Collapse repeated declarations of the same containment,
///   retaining the first location and any primary designation.
fn dedup_edges(edges: Vec<Located<Edge>>) -> Vec<Located<Edge>> {
    let mut index: FxHashMap<(Parent, String, Child, String), usize> = Default::default();
    let mut unique: Vec<Located<Edge>> = Vec::with_capacity(edges.len());

    for (edge, sources) in edges {
        let key = (
            edge.parent_type,
            edge.parent.clone(),
            edge.child_type,
            edge.child.clone(),
        );

        match index.get(&key) {
            Some(&i) => unique[i].0.primary |= edge.primary,
            None => {
                index.insert(key, unique.len());
                unique.push((edge, sources));
            }
        }
    }

    unique
}

fn add_row(
    output: &mut Output,
    defs: &TableDefinitionCollection,
    counter: &mut RowCounter,
    table: &str,
    values: &[Option<FieldData>],
    sources: &Option<SourceLineNumberCollection>,
    messages: &mut Messages,
) {
    let def = match defs.get(table) {
        Some(def) => def.clone(),
        None => return,
    };

    let mut row = Row::new(def, counter.next());
    row.set_sources(sources.clone());

    for (i, value) in values.iter().enumerate() {
        if let Err(e) = row.set(i, value.clone()) {
            messages.emit(&e);
        }
    }

    output.add_row(row, None);
}

/// Set column `column` of the row of `table` whose primary key is `key`.
///
/// A missing row has already been reported as an unresolved reference.
fn set_by_key(
    output: &mut Output,
    table: &str,
    key: &str,
    column: usize,
    value: &str,
    messages: &mut Messages,
) {
    let row = output
        .tables_mut()
        .get_mut(table)
        .and_then(|t| t.rows_mut().iter_mut().find(|row| row.primary_key() == key));

    if let Some(row) = row {
        if let Err(e) = row.set(column, Some(value.into())) {
            messages.emit(&e);
        }
    }
}

/// Write the primary feature of each backlinked component into the
///   feature column of the advertised resource.
pub fn process_feature_backlinks(
    backlinks: &[Located<FeatureBacklink>],
    component_features: &FxHashMap<String, String>,
    output: &mut Output,
    messages: &mut Messages,
) {
    for (backlink, sources) in backlinks {
        let feature = match component_features.get(backlink.component()) {
            Some(feature) => feature,
            None => {
                messages.emit(&LinkError::OrphanedComponent {
                    component: backlink.component().into(),
                    sources: sources.clone(),
                });
                continue;
            }
        };

        let ty = backlink.ty();
        let symbol = backlink.target_symbol();

        let row = output
            .tables_mut()
            .get_mut(ty.target_table())
            .and_then(|t| {
                t.rows_mut()
                    .iter_mut()
                    .find(|row| row.symbol_name().as_deref() == Some(symbol.as_str()))
            });

        match row {
            Some(row) => {
                if let Err(e) = row.set(ty.feature_column(), Some(feature.as_str().into())) {
                    messages.emit(&e);
                }
            }
            None => messages.emit(&LinkError::MissingBacklinkTarget {
                symbol,
                sources: sources.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod test;
