// Action sequencing
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

//! Scheduling of actions into sequence tables.
//!
//! Actions are authored as rows of the unreal `WixAction` table.
//! They are layered over the [standard actions](ActionTable::standard),
//!   replacing any standard action of the same sequence table and id;
//!     an authored action lacking a sequence number or condition takes
//!     those of the standard action it replaces.
//! An action that has no number of its own and is not a standard action
//!   cannot be placed and is an error,
//!     even if it provides `Before`/`After` hints.
//!
//! An action may be authored more than once if all but one definition
//!   is marked overridable;
//!     the definition that is not overridable wins.
//!
//! Only authored actions are scheduled.
//! Each sequence table receives one row per action in ascending order of
//!   sequence number.

use super::{LinkError, Output};
use crate::action::{Action, ActionTable, SequenceTable};
use crate::diagnose::Messages;
use crate::row::{FieldData, Row, RowCounter};
use crate::schema::TableDefinitionCollection;
use crate::span::SourceLineNumberCollection;
use fxhash::FxHashMap;

/// Column indexes of the `WixAction` table.
mod col {
    pub const SEQUENCE_TABLE: usize = 0;
    pub const ACTION: usize = 1;
    pub const CONDITION: usize = 2;
    pub const SEQUENCE: usize = 3;
    pub const BEFORE: usize = 4;
    pub const AFTER: usize = 5;
    pub const OVERRIDABLE: usize = 6;
}

/// An authored action along with the provenance of its row.
struct Authored {
    action: Action,
    overridable: bool,
    sources: Option<SourceLineNumberCollection>,
    section_id: Option<String>,
}

/// Schedule every authored action of `output` into its sequence table.
///
/// Overridden `WixAction` rows are removed from the output so that only
///   the winning definition of each action remains.
pub fn sequence_actions(
    output: &mut Output,
    standard: &ActionTable,
    defs: &TableDefinitionCollection,
    counter: &mut RowCounter,
    messages: &mut Messages,
) {
    let authored = collect_authored(output, messages);

    let mut scheduled = ActionTable::new();
    let mut provenance: FxHashMap<(SequenceTable, String), Authored> = Default::default();

    for mut entry in authored {
        let table = entry.action.sequence_table();
        let id = entry.action.id().to_string();

        if let Some(std) = standard.get(table, &id) {
            entry.action = merge_standard(entry.action, std);
        }

        let sequence = match entry.action.sequence() {
            Some(seq) => seq,
            None => {
                messages.emit(&LinkError::MissingActionSequence {
                    table,
                    action: id,
                    sources: entry.sources,
                });
                continue;
            }
        };

        entry.action.resolve(sequence);
        scheduled.add_overwrite(entry.action.clone());
        provenance.insert((table, id), entry);
    }

    for &table in SequenceTable::ALL {
        let def = match defs.get(table.as_str()) {
            Some(def) => def.clone(),
            None => continue,
        };

        for action in scheduled.in_sequence(table) {
            let origin = provenance.get(&(table, action.id().to_string()));

            let mut row = Row::new(def.clone(), counter.next());
            row.set_sources(origin.and_then(|o| o.sources.clone()));

            let values = [
                Some(FieldData::from(action.id())),
                action.condition().map(FieldData::from),
                action.sequence().map(|s| FieldData::Number(s.into())),
            ];

            for (i, value) in values.into_iter().enumerate() {
                if let Err(e) = row.set(i, value) {
                    messages.emit(&e);
                }
            }

            let section_id = origin.and_then(|o| o.section_id.as_deref());
            output.add_row(row, section_id);
        }
    }
}

/// Fill in what the authored action omits from the standard action.
fn merge_standard(authored: Action, std: &Action) -> Action {
    let condition = authored
        .condition()
        .map(String::from)
        .or_else(|| std.condition().map(String::from));

    let sequence = authored.sequence().or(std.sequence());
    let before = authored.before().map(String::from);
    let after = authored.after().map(String::from);

    Action::new(authored.sequence_table(), authored.id(), condition, sequence)
        .with_hints(before, after)
}

/// Read the winning definition of each action from the `WixAction`
///   table,
///     removing the rows of overridden definitions.
fn collect_authored(output: &mut Output, messages: &mut Messages) -> Vec<Authored> {
    let table = match output.tables_mut().get_mut("WixAction") {
        Some(table) => table,
        None => return vec![],
    };

    let mut winners: Vec<Authored> = Vec::new();
    let mut index: FxHashMap<(SequenceTable, String), usize> = Default::default();
    let mut keep_numbers = Vec::new();

    for row in table.iter() {
        let entry = match authored_from_row(row) {
            Ok(entry) => entry,
            Err(e) => {
                messages.emit(&e);
                continue;
            }
        };

        let key = (entry.action.sequence_table(), entry.action.id().to_string());

        match index.get(&key) {
            // an overridable definition yields to any other
            Some(&i) if winners[i].overridable && !entry.overridable => {
                keep_numbers[i] = row.number();
                winners[i] = entry;
            }
            Some(_) => (),
            None => {
                index.insert(key, winners.len());
                keep_numbers.push(row.number());
                winners.push(entry);
            }
        }
    }

    table.retain(|row| keep_numbers.contains(&row.number()));

    winners
}

fn authored_from_row(row: &Row) -> Result<Authored, LinkError> {
    let table_name = row.get_str(col::SEQUENCE_TABLE).unwrap_or_default();

    let table: SequenceTable =
        table_name
            .parse()
            .map_err(|_| LinkError::UnknownSequenceTable {
                table: table_name.into(),
                sources: row.sources().cloned(),
            })?;

    let sequence = row
        .get_number(col::SEQUENCE)
        .and_then(|n| i32::try_from(n).ok());

    let action = Action::new(
        table,
        row.get_str(col::ACTION).unwrap_or_default(),
        row.get_str(col::CONDITION).map(String::from),
        sequence,
    )
    .with_hints(
        row.get_str(col::BEFORE).map(String::from),
        row.get_str(col::AFTER).map(String::from),
    );

    Ok(Authored {
        action,
        overridable: row.get_number(col::OVERRIDABLE) == Some(1),
        sources: row.sources().cloned(),
        section_id: row.section_id().map(String::from),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ld::OutputType;

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

        fn action(
            &mut self,
            table: &str,
            id: &str,
            sequence: Option<i64>,
            overridable: bool,
        ) {
            let def = self.defs.get("WixAction").unwrap().clone();
            let mut row = Row::new(def, self.counter.next());

            row.set(col::SEQUENCE_TABLE, Some(table.into())).unwrap();
            row.set(col::ACTION, Some(id.into())).unwrap();
            row.set(col::SEQUENCE, sequence.map(FieldData::Number)).unwrap();
            row.set(
                col::OVERRIDABLE,
                overridable.then_some(FieldData::Number(1)),
            )
            .unwrap();

            self.output.add_row(row, Some("Frag"));
        }

        fn run(&mut self) {
            let standard = ActionTable::standard().unwrap();

            sequence_actions(
                &mut self.output,
                &standard,
                &self.defs,
                &mut self.counter,
                &mut self.messages,
            );
        }

        fn sequence(&self, table: &str) -> Vec<(String, i64)> {
            self.output
                .tables()
                .get(table)
                .map(|t| {
                    t.iter()
                        .map(|row| {
                            (
                                row.get_str(0).unwrap_or_default().to_string(),
                                row.get_number(2).unwrap_or_default(),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default()
        }
    }

    #[test]
    fn rows_emitted_in_ascending_sequence() {
        let mut sut = Sut::new();

        sut.action("InstallExecuteSequence", "InstallFinalize", None, false);
        sut.action("InstallExecuteSequence", "MyAction", Some(1450), false);
        sut.action("InstallExecuteSequence", "CostInitialize", None, false);

        sut.run();

        assert_eq!(
            vec![
                ("CostInitialize".into(), 800),
                ("MyAction".into(), 1450),
                ("InstallFinalize".into(), 6600),
            ],
            sut.sequence("InstallExecuteSequence")
        );
        assert!(!sut.messages.encountered_error());
    }

    #[test]
    fn authored_number_overrides_standard() {
        let mut sut = Sut::new();

        sut.action("AdminExecuteSequence", "CostInitialize", Some(850), false);
        sut.run();

        assert_eq!(
            vec![("CostInitialize".into(), 850)],
            sut.sequence("AdminExecuteSequence")
        );
    }

    #[test]
    fn standard_condition_is_inherited() {
        let mut sut = Sut::new();

        sut.action("InstallExecuteSequence", "StartServices", None, false);
        sut.run();

        let row = &sut.output.tables().get("InstallExecuteSequence").unwrap().rows()[0];
        assert_eq!(Some("VersionNT"), row.get_str(1));
        assert_eq!(Some("Frag"), row.section_id());
    }

    #[test]
    fn unnumbered_custom_action_is_an_error() {
        let mut sut = Sut::new();

        sut.action("InstallUISequence", "Custom", None, false);
        sut.run();

        assert_eq!(1, sut.messages.with_resource("StandardActionNotFound").count());
        assert!(sut.sequence("InstallUISequence").is_empty());
    }

    #[test]
    fn non_overridable_definition_wins() {
        let mut sut = Sut::new();

        sut.action("InstallUISequence", "Custom", Some(10), true);
        sut.action("InstallUISequence", "Custom", Some(20), false);
        sut.run();

        assert_eq!(
            vec![("Custom".into(), 20)],
            sut.sequence("InstallUISequence")
        );
        assert_eq!(1, sut.output.tables().get("WixAction").unwrap().len());
    }

    #[test]
    fn unknown_sequence_table_is_an_error() {
        let mut sut = Sut::new();

        sut.action("BogusSequence", "Custom", Some(10), false);
        sut.run();

        assert_eq!(1, sut.messages.with_resource("UnknownSequenceTable").count());
    }
}
