// Symbol resolution and section reachability
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

//! Symbol table construction and reachability analysis.
//!
//! Sections form a directed graph:
//!
//!   - a [`Reference`] is an edge from the referencing section to the
//!     section defining the referenced symbol;
//!   - a [`ComplexReference`] is an edge from the section defining its
//!     parent to the section declaring it,
//!       so that containment implies reachability even where nothing
//!       references the child by name;
//!         the declaring section in turn requires the child symbol.
//!
//! Every section reachable from the entry section contributes to the
//!   output;
//!     all others are pruned.
//! References are only required to resolve for reachable sections,
//!   but every unresolved reference of a reachable section is reported.

use super::LinkError;
use crate::diagnose::Messages;
use crate::obj::Section;
use crate::span::SourceLineNumberCollection;
use crate::sym::{ComplexReference, SectionIndex, Symbol, SymbolCollection};
use fixedbitset::FixedBitSet;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

/// Locate the single section that anchors the link.
///
/// Only product,
///   module,
///   and patch creation sections may be entry sections.
pub fn find_entry_section(sections: &[Section]) -> Result<SectionIndex, LinkError> {
    let candidates: Vec<_> = sections
        .iter()
        .enumerate()
        .filter(|(_, s)| s.ty().is_entry())
        .collect();

    match candidates.as_slice() {
        [] => Err(LinkError::MissingEntrySection),
        [(index, _)] => Ok(*index),
        _ => Err(LinkError::MultipleEntrySections(
            candidates
                .iter()
                .map(|(_, s)| {
                    (
                        s.symbol_name().unwrap_or_default(),
                        s.sources().cloned(),
                    )
                })
                .collect(),
        )),
    }
}

/// Build the symbol table of every section,
///   emitting an error for each duplicate definition.
///
/// Duplicate definitions of an action that is marked overridable are
///   permitted so long as at most one of the definitions is not
///   overridable;
///     see [`super::sequence`].
pub fn build_symbols(sections: &[Section], messages: &mut Messages) -> SymbolCollection {
    let mut symbols = SymbolCollection::new();

    for (index, section) in sections.iter().enumerate() {
        let section_symbols = section.symbols(index);

        for dup in section_symbols.duplicates {
            messages.emit(&dup);

            for related in dup.related() {
                messages.emit(&related);
            }
        }

        for symbol in section_symbols.symbols {
            let name = symbol.name().to_string();

            if let Err(dup) = symbols.insert(symbol) {
                if is_permitted_override(sections, symbols.get_all(&name)) {
                    continue;
                }

                messages.emit(&dup);

                for related in dup.related() {
                    messages.emit(&related);
                }
            }
        }
    }

    symbols
}

/// Whether every definition but at most one is an overridable action.
fn is_permitted_override(sections: &[Section], defs: &[Symbol]) -> bool {
    let fixed = defs
        .iter()
        .filter(|sym| !is_overridable_action(sections, sym))
        .count();

    fixed <= 1 && defs.iter().any(|sym| is_overridable_action(sections, sym))
}

fn is_overridable_action(sections: &[Section], symbol: &Symbol) -> bool {
    symbol
        .row()
        .filter(|row_ref| row_ref.table == "WixAction")
        .and_then(|row_ref| {
            sections
                .get(symbol.section())?
                .tables()
                .get(&row_ref.table)?
                .rows()
                .get(row_ref.index)
        })
        .and_then(|row| row.get_number(6))
        == Some(1)
}

/// A reference of a section that did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Unresolved {
    section: SectionIndex,
    name: String,
}

/// Dependency graph of sections.
///
/// Node weights are section indexes,
///   and nodes are added in section order so that a section's index is
///   also its node index.
pub struct SectionGraph {
    graph: DiGraph<SectionIndex, ()>,
    unresolved: Vec<Unresolved>,
}

impl SectionGraph {
    pub fn build(sections: &[Section], symbols: &SymbolCollection) -> Self {
        let mut graph = DiGraph::with_capacity(sections.len(), sections.len());
        let mut unresolved = Vec::new();

        for index in 0..sections.len() {
            graph.add_node(index);
        }

        let mut require =
            |graph: &mut DiGraph<SectionIndex, ()>, from: SectionIndex, name: &str| {
                match symbols.get(name) {
                    Some(sym) => {
                        graph.update_edge(
                            NodeIndex::new(from),
                            NodeIndex::new(sym.section()),
                            (),
                        );
                    }
                    None => unresolved.push(Unresolved {
                        section: from,
                        name: name.into(),
                    }),
                }
            };

        for (index, section) in sections.iter().enumerate() {
            for reference in section.references() {
                require(&mut graph, index, reference.name());
            }

            for cref in section.complex_references() {
                let parent = cref.parent_symbol();

                // the parent pulls in the section declaring containment
                if let Some(sym) = symbols.get(&parent) {
                    graph.update_edge(
                        NodeIndex::new(sym.section()),
                        NodeIndex::new(index),
                        (),
                    );
                }

                require(&mut graph, index, &parent);
                require(&mut graph, index, &cref.child_symbol());
            }
        }

        Self { graph, unresolved }
    }

    /// Sections reachable from `entry`,
    ///   including `entry` itself.
    pub fn reachable_from(&self, entry: SectionIndex) -> FixedBitSet {
        let mut reachable = FixedBitSet::with_capacity(self.graph.node_count());
        let mut dfs = Dfs::new(&self.graph, NodeIndex::new(entry));

        while let Some(node) = dfs.next(&self.graph) {
            reachable.insert(self.graph[node]);
        }

        reachable
    }

    /// Emit an error for every unresolved reference of a reachable
    ///   section,
    ///     returning the number of errors emitted.
    pub fn report_unresolved(
        &self,
        sections: &[Section],
        reachable: &FixedBitSet,
        messages: &mut Messages,
    ) -> usize {
        let mut count = 0;

        for unresolved in &self.unresolved {
            if !reachable.contains(unresolved.section) {
                continue;
            }

            messages.emit(&LinkError::UnresolvedReference {
                name: unresolved.name.clone(),
                sources: section_sources(&sections[unresolved.section]),
            });

            count += 1;
        }

        count
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

fn section_sources(section: &Section) -> Option<SourceLineNumberCollection> {
    section.sources().cloned()
}

/// Every [`ComplexReference`] of the reachable sections,
///   along with the location of its section,
///   in section order.
pub fn reachable_complex_references(
    sections: &[Section],
    reachable: &FixedBitSet,
) -> Vec<(ComplexReference, Option<SourceLineNumberCollection>)> {
    reachable
        .ones()
        .filter_map(|index| sections.get(index))
        .flat_map(|section| {
            let sources = section_sources(section);

            section
                .complex_references()
                .iter()
                .map(move |cref| (cref.clone(), sources.clone()))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::obj::SectionType;
    use crate::row::{FieldData, RowCounter};
    use crate::schema::TableDefinitionCollection;
    use crate::sym::{ComplexReferenceChildType, ComplexReferenceParentType, Reference};

    fn section(id: &str, ty: SectionType) -> Section {
        Section::new(Some(id.into()), ty, None).unwrap()
    }

    fn with_component(mut section: Section, id: &str) -> Section {
        let defs = TableDefinitionCollection::builtin().unwrap();
        let def = defs.get("Component").unwrap();

        section
            .tables_mut()
            .ensure_table(def)
            .create_row(&mut RowCounter::new())
            .set(0, Some(id.into()))
            .unwrap();

        section
    }

    #[test]
    fn entry_section_must_be_unique() {
        let frag = section("F", SectionType::Fragment);

        assert!(matches!(
            find_entry_section(&[frag.clone()]),
            Err(LinkError::MissingEntrySection)
        ));

        assert_eq!(
            1,
            find_entry_section(&[frag.clone(), section("P", SectionType::Product)])
                .unwrap()
        );

        match find_entry_section(&[
            section("P", SectionType::Product),
            frag,
            section("M", SectionType::Module),
        ]) {
            Err(LinkError::MultipleEntrySections(candidates)) => {
                let names: Vec<_> =
                    candidates.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(vec!["Product:P", "Module:M"], names);
            }
            other => panic!("expected multiple entry sections: {other:?}"),
        }
    }

    #[test]
    fn duplicates_across_sections_are_reported() {
        let sections = vec![
            with_component(section("A", SectionType::Fragment), "CompX"),
            with_component(section("B", SectionType::Fragment), "CompX"),
        ];

        let mut messages = Messages::default();
        let symbols = build_symbols(&sections, &mut messages);

        assert!(messages.encountered_error());
        assert_eq!(1, messages.with_resource("DuplicateSymbol").count());
        assert_eq!(1, messages.with_resource("DuplicateSymbol2").count());
        assert_eq!(2, symbols.get_all("Component:CompX").len());
    }

    #[test]
    fn reachability_follows_references_transitively() {
        let entry = {
            let mut s = section("P", SectionType::Product);
            s.add_reference(Reference::new("Fragment", "FragB"));
            s
        };
        let frag_a = with_component(section("FragA", SectionType::Fragment), "CompX");
        let frag_b = {
            let mut s = section("FragB", SectionType::Fragment);
            s.add_reference(Reference::new("Component", "CompX"));
            s
        };
        let unused = section("Unused", SectionType::Fragment);

        let sections = vec![entry, frag_a, frag_b, unused];
        let mut messages = Messages::default();
        let symbols = build_symbols(&sections, &mut messages);
        let graph = SectionGraph::build(&sections, &symbols);
        let reachable = graph.reachable_from(0);

        assert_eq!(vec![0, 1, 2], reachable.ones().collect::<Vec<_>>());
        assert_eq!(0, graph.report_unresolved(&sections, &reachable, &mut messages));
    }

    #[test]
    fn complex_reference_parent_pulls_in_declaring_section() {
        let entry = {
            let mut s = section("P", SectionType::Product);
            s.add_complex_reference(
                ComplexReference::new(
                    ComplexReferenceParentType::Feature,
                    "Main",
                    None,
                    ComplexReferenceChildType::Fragment,
                    "Feat",
                    false,
                )
                .unwrap(),
            );
            s
        };

        let feature_section = {
            let defs = TableDefinitionCollection::builtin().unwrap();
            let mut s = section("Feat", SectionType::Fragment);
            let row = s
                .tables_mut()
                .ensure_table(defs.get("Feature").unwrap())
                .create_row(&mut RowCounter::new());
            row.set(0, Some("Main".into())).unwrap();
            row.set(5, Some(FieldData::Number(1))).unwrap();
            row.set(7, Some(FieldData::Number(0))).unwrap();
            s
        };

        // attaches a component under `Main` without being referenced
        let component_section = {
            let mut s =
                with_component(section("Comps", SectionType::Fragment), "CompX");
            s.add_complex_reference(
                ComplexReference::new(
                    ComplexReferenceParentType::Feature,
                    "Main",
                    None,
                    ComplexReferenceChildType::Component,
                    "CompX",
                    true,
                )
                .unwrap(),
            );
            s
        };

        let sections = vec![entry, feature_section, component_section];
        let mut messages = Messages::default();
        let symbols = build_symbols(&sections, &mut messages);
        let graph = SectionGraph::build(&sections, &symbols);
        let reachable = graph.reachable_from(0);

        assert_eq!(vec![0, 1, 2], reachable.ones().collect::<Vec<_>>());
        assert!(!messages.encountered_error());
    }

    #[test]
    fn unresolved_only_reported_for_reachable_sections() {
        let entry = {
            let mut s = section("P", SectionType::Product);
            s.add_reference(Reference::new("Property", "MISSING1"));
            s.add_reference(Reference::new("Property", "MISSING2"));
            s
        };
        let unused = {
            let mut s = section("Unused", SectionType::Fragment);
            s.add_reference(Reference::new("Property", "MISSING3"));
            s
        };

        let sections = vec![entry, unused];
        let mut messages = Messages::default();
        let symbols = build_symbols(&sections, &mut messages);
        let graph = SectionGraph::build(&sections, &symbols);
        let reachable = graph.reachable_from(0);

        assert_eq!(2, graph.report_unresolved(&sections, &reachable, &mut messages));

        let names: Vec<_> = messages
            .with_resource("UnresolvedReference")
            .map(|m| m.args()[0].clone())
            .collect();
        assert_eq!(vec!["Property:MISSING1", "Property:MISSING2"], names);
    }
}
