// Tests for complex reference processing
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

use super::*;
use crate::ld::OutputType;
use crate::sym::FeatureBacklinkType;

fn cref(
    parent_type: Parent,
    parent: &str,
    child_type: Child,
    child: &str,
    primary: bool,
) -> Located<ComplexReference> {
    (
        ComplexReference::new(parent_type, parent, None, child_type, child, primary)
            .unwrap(),
        None,
    )
}

struct Sut {
    defs: TableDefinitionCollection,
    counter: RowCounter,
    messages: Messages,
    output: Output,
}

impl Sut {
    fn new() -> Self {
        Self {
            defs: TableDefinitionCollection::builtin().unwrap(),
            counter: RowCounter::new(),
            messages: Messages::default(),
            output: Output::new(OutputType::Product, "Prod", None),
        }
    }

    fn add(&mut self, table: &str, values: &[FieldData]) {
        let mut row = Row::new(self.defs.get(table).unwrap().clone(), self.counter.next());

        for (i, value) in values.iter().enumerate() {
            row.set(i, Some(value.clone())).unwrap();
        }

        self.output.add_row(row, None);
    }

    fn feature(&mut self, id: &str) {
        self.add(
            "Feature",
            &[
                id.into(),
                FieldData::String(String::new()),
                FieldData::String(String::new()),
                FieldData::String(String::new()),
                FieldData::Number(1),
                FieldData::Number(1),
                FieldData::String(String::new()),
                FieldData::Number(0),
            ],
        );
    }

    fn process(&mut self, crefs: &[Located<ComplexReference>]) -> ComplexReferenceResult {
        process_complex_references(
            crefs,
            &mut self.output,
            &self.defs,
            &mut self.counter,
            &mut self.messages,
        )
    }

    fn pairs(&self, table: &str) -> Vec<(String, String)> {
        self.output
            .tables()
            .get(table)
            .map(|t| {
                t.iter()
                    .map(|row| {
                        (
                            row.get_text(0).unwrap_or_default(),
                            row.get_text(1).unwrap_or_default(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[test]
fn feature_components_rows_and_first_feature_is_primary() {
    let mut sut = Sut::new();

    let result = sut.process(&[
        cref(Parent::Feature, "F1", Child::Component, "C1", false),
        cref(Parent::Feature, "F2", Child::Component, "C1", false),
    ]);

    assert_eq!(
        vec![("F1".into(), "C1".into()), ("F2".into(), "C1".into())],
        sut.pairs("FeatureComponents")
    );
    assert_eq!(Some(&"F1".to_string()), result.component_features.get("C1"));
    assert!(!sut.messages.encountered_error());
}

#[test]
fn explicit_primary_overrides_first_feature() {
    let mut sut = Sut::new();

    let result = sut.process(&[
        cref(Parent::Feature, "F1", Child::Component, "C1", false),
        cref(Parent::Feature, "F2", Child::Component, "C1", true),
    ]);

    assert_eq!(Some(&"F2".to_string()), result.component_features.get("C1"));
}

#[test]
fn two_explicit_primaries_is_an_error() {
    let mut sut = Sut::new();

    sut.process(&[
        cref(Parent::Feature, "F1", Child::Component, "C1", true),
        cref(Parent::Feature, "F2", Child::Component, "C1", true),
    ]);

    assert_eq!(1, sut.messages.with_resource("MultiplePrimaryReferences").count());
}

#[test]
fn repeated_containment_yields_one_row() {
    let mut sut = Sut::new();

    let result = sut.process(&[
        cref(Parent::Feature, "F1", Child::Component, "C1", false),
        cref(Parent::Feature, "F2", Child::Component, "C1", false),
        cref(Parent::Feature, "F2", Child::Component, "C1", true),
    ]);

    assert_eq!(2, sut.pairs("FeatureComponents").len());
    assert_eq!(Some(&"F2".to_string()), result.component_features.get("C1"));
    assert!(sut.output.validate_primary_keys().is_empty());
}

#[test]
fn component_groups_are_flattened_recursively() {
    let mut sut = Sut::new();

    sut.process(&[
        cref(Parent::Feature, "F1", Child::ComponentGroup, "Outer", false),
        cref(Parent::ComponentGroup, "Outer", Child::Component, "C1", false),
        cref(Parent::ComponentGroup, "Outer", Child::ComponentGroup, "Inner", false),
        cref(Parent::ComponentGroup, "Inner", Child::Component, "C2", false),
    ]);

    assert_eq!(
        vec![("F1".into(), "C1".into()), ("F1".into(), "C2".into())],
        sut.pairs("FeatureComponents")
    );
}

#[test]
fn component_group_cycle_is_an_error() {
    let mut sut = Sut::new();

    sut.process(&[
        cref(Parent::Feature, "F1", Child::ComponentGroup, "A", false),
        cref(Parent::ComponentGroup, "A", Child::ComponentGroup, "B", false),
        cref(Parent::ComponentGroup, "B", Child::ComponentGroup, "A", false),
        cref(Parent::ComponentGroup, "B", Child::Component, "C1", false),
    ]);

    let cycles: Vec<_> = sut.messages.with_resource("ReferenceLoopDetected").collect();

    assert_eq!(1, cycles.len());
    assert_eq!(&["A".to_string(), "B".to_string()], cycles[0].args());
    assert!(sut.pairs("FeatureComponents").is_empty());
}

#[test]
fn module_components_rows() {
    let mut sut = Sut::new();

    sut.process(&[(
        ComplexReference::new(
            Parent::Module,
            "Mod",
            Some("1033".into()),
            Child::Component,
            "C1",
            false,
        )
        .unwrap(),
        None,
    )]);

    let table = sut.output.tables().get("ModuleComponents").unwrap();
    let row = &table.rows()[0];

    assert_eq!(Some("C1"), row.get_str(0));
    assert_eq!(Some("Mod"), row.get_str(1));
    assert_eq!(Some(1033), row.get_number(2));
}

#[test]
fn feature_parent_is_set_once() {
    let mut sut = Sut::new();
    sut.feature("Parent1");
    sut.feature("Parent2");
    sut.feature("Child");

    sut.process(&[
        cref(Parent::Feature, "Parent1", Child::Feature, "Child", false),
        cref(Parent::Feature, "Parent2", Child::Feature, "Child", false),
    ]);

    let child = sut
        .output
        .tables()
        .get("Feature")
        .unwrap()
        .iter()
        .find(|row| row.get_str(0) == Some("Child"))
        .unwrap();

    assert_eq!(Some("Parent1"), child.get_str(1));
    assert_eq!(1, sut.messages.with_resource("ComponentReferencedTwice").count());
}

#[test]
fn merge_module_connects_to_features() {
    let mut sut = Sut::new();
    sut.add(
        "WixMerge",
        &[
            "Mm".into(),
            FieldData::Number(1033),
            "TARGETDIR".into(),
            "mm.msm".into(),
            FieldData::Number(1),
        ],
    );

    sut.process(&[
        cref(Parent::Feature, "F1", Child::Module, "Mm", false),
        cref(Parent::Feature, "F2", Child::Module, "Mm", true),
    ]);

    let merge = &sut.output.tables().get("WixMerge").unwrap().rows()[0];

    assert_eq!(Some("F2"), merge.get_str(7));
    assert_eq!(vec!["F1", "F2"], sut.output.merge_features()["Mm"]);
}

#[test]
fn backlink_receives_primary_feature() {
    let mut sut = Sut::new();
    sut.add(
        "Shortcut",
        &["Sc".into(), "ProgramMenuFolder".into(), "App".into(), "C1".into()],
    );

    let result = sut.process(&[cref(Parent::Feature, "F1", Child::Component, "C1", false)]);

    process_feature_backlinks(
        &[
            (FeatureBacklink::new("C1", FeatureBacklinkType::Shortcut, "Sc"), None),
            (FeatureBacklink::new("Orphan", FeatureBacklinkType::Shortcut, "Sc"), None),
            (FeatureBacklink::new("C1", FeatureBacklinkType::Shortcut, "Nope"), None),
        ],
        &result.component_features,
        &mut sut.output,
        &mut sut.messages,
    );

    let shortcut = &sut.output.tables().get("Shortcut").unwrap().rows()[0];

    assert_eq!(Some("F1"), shortcut.get_str(4));
    assert_eq!(1, sut.messages.with_resource("OrphanedComponent").count());
    assert_eq!(1, sut.messages.with_resource("MissingFeatureBacklinkTarget").count());
}
