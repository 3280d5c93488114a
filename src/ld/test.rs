// Tests for the linker
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
use crate::diagnose::MessageOptions;
use crate::obj::SectionType;
use crate::row::FieldData;
use crate::sym::{ComplexReference, ComplexReferenceChildType, ComplexReferenceParentType, Reference};
use std::fs;

struct Sut {
    defs: TableDefinitionCollection,
    counter: RowCounter,
    messages: Messages,
}

impl Sut {
    fn new() -> Self {
        Self {
            defs: TableDefinitionCollection::builtin().unwrap(),
            counter: RowCounter::new(),
            messages: Messages::buffered(MessageOptions {
                verbose: true,
                ..Default::default()
            }),
        }
    }

    fn linker(&mut self) -> Linker<'_> {
        Linker::new(
            &self.defs,
            &mut self.counter,
            &mut self.messages,
            LinkerOptions::default(),
        )
    }

    fn section(&self, id: &str, ty: SectionType) -> Section {
        Section::new(Some(id.into()), ty, None).unwrap()
    }

    fn row(&mut self, section: &mut Section, table: &str, values: &[FieldData]) {
        let def = self.defs.get(table).unwrap();
        let row = section
            .tables_mut()
            .ensure_table(def)
            .create_row(&mut self.counter);

        for (i, value) in values.iter().enumerate() {
            row.set(i, Some(value.clone())).unwrap();
        }
    }

    fn component(&mut self, section: &mut Section, id: &str) {
        self.row(
            section,
            "Component",
            &[
                id.into(),
                FieldData::String(String::new()),
                "TARGETDIR".into(),
                FieldData::Number(0),
            ],
        );
    }
}

fn intermediate(sections: Vec<Section>) -> Intermediate {
    let mut intermediate = Intermediate::new(Some("test.wxs".into()));

    for section in sections {
        intermediate.add_section(section);
    }

    intermediate
}

fn components(output: &Output) -> Vec<(String, Option<String>)> {
    output
        .tables()
        .get("Component")
        .map(|t| {
            t.iter()
                .map(|row| {
                    (
                        row.get_text(0).unwrap_or_default(),
                        row.section_id().map(String::from),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

// Rows of every reachable fragment appear in the output;
//   rows of unreachable fragments do not.
#[test]
fn link_includes_transitively_reachable_fragments_only() {
    let mut sut = Sut::new();

    let mut entry = sut.section("Prod", SectionType::Product);
    entry.add_reference(Reference::new("Fragment", "FragB"));

    let mut frag_a = sut.section("FragA", SectionType::Fragment);
    sut.component(&mut frag_a, "CompX");

    let mut frag_b = sut.section("FragB", SectionType::Fragment);
    frag_b.add_reference(Reference::new("Component", "CompX"));

    let mut unused = sut.section("Unused", SectionType::Fragment);
    sut.component(&mut unused, "CompUnused");

    let output = sut
        .linker()
        .link(vec![
            intermediate(vec![frag_a, unused]),
            intermediate(vec![entry, frag_b]),
        ])
        .unwrap();

    assert_eq!(OutputType::Product, output.ty());
    assert_eq!("Prod", output.entry_id());
    assert_eq!(
        vec![("CompX".to_string(), Some("FragA".to_string()))],
        components(&output)
    );
    assert!(!sut.messages.encountered_error());
}

#[test]
fn link_without_entry_section_fails() {
    let mut sut = Sut::new();
    let frag = sut.section("Frag", SectionType::Fragment);

    assert!(matches!(
        sut.linker().link(vec![intermediate(vec![frag])]),
        Err(LinkError::MissingEntrySection)
    ));
}

#[test]
fn duplicate_symbols_fail_the_build() {
    let mut sut = Sut::new();

    let mut entry = sut.section("Prod", SectionType::Product);
    sut.component(&mut entry, "CompX");

    let mut frag = sut.section("Frag", SectionType::Fragment);
    sut.component(&mut frag, "CompX");

    sut.linker()
        .link(vec![intermediate(vec![entry, frag])])
        .unwrap();

    assert!(sut.messages.encountered_error());
    assert_eq!(1, sut.messages.with_resource("DuplicateSymbol").count());
    assert_eq!(1, sut.messages.with_resource("DuplicateSymbol2").count());
}

#[test]
fn link_materializes_containment_and_actions() {
    let mut sut = Sut::new();

    let mut entry = sut.section("Prod", SectionType::Product);
    sut.row(
        &mut entry,
        "Feature",
        &[
            "Main".into(),
            FieldData::String(String::new()),
            FieldData::String(String::new()),
            FieldData::String(String::new()),
            FieldData::Number(1),
            FieldData::Number(1),
            FieldData::String(String::new()),
            FieldData::Number(0),
        ],
    );
    sut.row(
        &mut entry,
        "WixAction",
        &["InstallExecuteSequence".into(), "InstallFinalize".into()],
    );

    // reachable only through containment under `Main`
    let mut comps = sut.section("Comps", SectionType::Fragment);
    sut.component(&mut comps, "CompX");
    comps.add_complex_reference(
        ComplexReference::new(
            ComplexReferenceParentType::Feature,
            "Main",
            None,
            ComplexReferenceChildType::Component,
            "CompX",
            false,
        )
        .unwrap(),
    );

    let output = sut
        .linker()
        .link(vec![intermediate(vec![entry, comps])])
        .unwrap();

    let fc = &output.tables().get("FeatureComponents").unwrap().rows()[0];
    assert_eq!(Some("Main"), fc.get_str(0));
    assert_eq!(Some("CompX"), fc.get_str(1));

    let seq = &output.tables().get("InstallExecuteSequence").unwrap().rows()[0];
    assert_eq!(Some("InstallFinalize"), seq.get_str(0));
    assert_eq!(Some(6600), seq.get_number(2));

    assert!(!sut.messages.encountered_error());
}

#[test]
fn combine_requires_no_entry_section() {
    let mut sut = Sut::new();

    let mut frag_a = sut.section("A", SectionType::Fragment);
    sut.component(&mut frag_a, "CompX");

    let mut frag_b = sut.section("B", SectionType::Fragment);
    sut.component(&mut frag_b, "CompX");

    let library = sut.linker().combine(vec![
        intermediate(vec![frag_a]),
        intermediate(vec![frag_b]),
    ]);

    assert_eq!(2, library.intermediates().len());
    assert_eq!(1, sut.messages.with_resource("DuplicateSymbol").count());
}

const OBJ: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<wixObject src="product.wxs" version="2.0.5805.0">
  <section id="Prod" type="product" />
</wixObject>"#;

#[test]
fn load_visits_each_path_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("product.wixobj");
    fs::write(&path, OBJ).unwrap();

    let mut sut = Sut::new();
    let intermediates = sut.linker().load(&[&path, &path]).unwrap();

    assert_eq!(1, intermediates.len());
    assert!(sut
        .messages
        .iter()
        .any(|msg| msg.text().contains("already loaded")));
}

#[test]
fn load_expands_libraries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib.wixlib");

    let inner = OBJ.replace(r#"<?xml version="1.0" encoding="utf-8"?>"#, "");
    fs::write(
        &path,
        format!(r#"<wixLibrary version="2.0.5805.0">{inner}{inner}</wixLibrary>"#),
    )
    .unwrap();

    let mut sut = Sut::new();
    let intermediates = sut.linker().load(&[path]).unwrap();

    assert_eq!(2, intermediates.len());
}

#[test]
fn load_missing_file_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.wixobj");

    let mut sut = Sut::new();

    match sut.linker().load(&[&path]) {
        Err(LinkError::Io(name, _)) => assert!(name.ends_with("missing.wixobj")),
        other => panic!("expected i/o error: {other:?}"),
    }
}
