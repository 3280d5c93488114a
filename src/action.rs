// Installer actions and their sequencing
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

//! Installer actions and the five sequence tables that order them.
//!
//! An [`Action`] is keyed by its [`SequenceTable`] and id;
//!   the same action may be scheduled in more than one sequence table,
//!     each being a distinct [`Action`].
//! Within a sequence table,
//!   actions are emitted in ascending order of sequence number.
//!
//! The standard actions of the installer are built in
//!   (see [`ActionTable::standard`]).
//! They are declared as XML in which a single `action` element may
//!   schedule the same action in several sequence tables:
//!
//! ```xml
//! <actions>
//!   <action name="CostInitialize" sequence="800"
//!           AdminUISequence="yes" InstallExecuteSequence="yes" />
//! </actions>
//! ```

use crate::diagnose::Diagnostic;
use crate::xir::{self, Attrs, Event, XirError};
use arrayvec::ArrayVec;
use static_assertions::const_assert_eq;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Display};
use std::io::BufRead;

str_enum! {
    /// One of the ordered lists of installer actions.
    ///
    /// The string form is the name of the table in the installer
    ///   database.
    pub enum SequenceTable {
        AdminUISequence => "AdminUISequence",
        AdminExecuteSequence => "AdminExecuteSequence",
        AdvertiseExecuteSequence => "AdvtExecuteSequence",
        InstallUISequence => "InstallUISequence",
        InstallExecuteSequence => "InstallExecuteSequence",
    }
}

/// Number of sequence tables,
///   and so the maximum number of [`Action`]s that a single `action`
///   element may declare.
pub const SEQUENCE_TABLE_COUNT: usize = 5;

const_assert_eq!(SequenceTable::ALL.len(), SEQUENCE_TABLE_COUNT);

/// Standard actions of the installer.
const STANDARD_ACTIONS: &str = include_str!("action/actions.xml");

/// An action scheduled in a sequence table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    sequence_table: SequenceTable,
    id: String,
    condition: Option<String>,
    sequence: Option<i32>,
    before: Option<String>,
    after: Option<String>,
    resolved: bool,
}

impl Action {
    pub fn new<S: Into<String>>(
        sequence_table: SequenceTable,
        id: S,
        condition: Option<String>,
        sequence: Option<i32>,
    ) -> Self {
        Self {
            sequence_table,
            id: id.into(),
            condition,
            sequence,
            before: None,
            after: None,
            resolved: false,
        }
    }

    /// Provide placement hints relative to other actions.
    pub fn with_hints(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    pub fn sequence_table(&self) -> SequenceTable {
        self.sequence_table
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn sequence(&self) -> Option<i32> {
        self.sequence
    }

    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    /// Whether the sequence number of this action has been finalized.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Finalize the sequence number of this action.
    pub fn resolve(&mut self, sequence: i32) {
        self.sequence = Some(sequence);
        self.resolved = true;
    }
}

/// Actions indexed by sequence table and id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionTable {
    actions: BTreeMap<(SequenceTable, String), Action>,
}

impl ActionTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// The standard actions of the installer.
    pub fn standard() -> Result<Self, ActionError> {
        Self::load(STANDARD_ACTIONS.as_bytes())
    }

    /// Add an action,
    ///   keeping any existing action of the same sequence table and id.
    ///
    /// Returns `false` if an existing action was kept.
    pub fn add(&mut self, action: Action) -> bool {
        let key = (action.sequence_table, action.id.clone());

        if self.actions.contains_key(&key) {
            return false;
        }

        self.actions.insert(key, action);
        true
    }

    /// Add an action,
    ///   replacing any existing action of the same sequence table and id.
    ///
    /// Returns the replaced action.
    pub fn add_overwrite(&mut self, action: Action) -> Option<Action> {
        self.actions
            .insert((action.sequence_table, action.id.clone()), action)
    }

    pub fn get(&self, table: SequenceTable, id: &str) -> Option<&Action> {
        self.actions.get(&(table, id.to_string()))
    }

    pub fn get_mut(&mut self, table: SequenceTable, id: &str) -> Option<&mut Action> {
        self.actions.get_mut(&(table, id.to_string()))
    }

    pub fn contains(&self, table: SequenceTable, id: &str) -> bool {
        self.get(table, id).is_some()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Action> {
        self.actions.values_mut()
    }

    /// Actions of the given sequence table in ascending order of sequence
    ///   number,
    ///     ties broken by id.
    ///
    /// Actions lacking a sequence number are ordered last.
    pub fn in_sequence(&self, table: SequenceTable) -> Vec<&Action> {
        let mut actions: Vec<_> = self
            .actions
            .range((table, String::new())..)
            .take_while(|((t, _), _)| *t == table)
            .map(|(_, action)| action)
            .collect();

        actions.sort_by(|a, b| {
            let key = |x: &Action| (x.sequence.is_none(), x.sequence);
            key(a).cmp(&key(b)).then_with(|| a.id.cmp(&b.id))
        });

        actions
    }

    /// Load actions from an `actions` document.
    ///
    /// Each `action` element requires a `name` and a positive `sequence`,
    ///   and must schedule the action in at least one sequence table by
    ///   setting an attribute of that table's name to `yes`.
    /// An element scheduling into multiple tables yields one [`Action`]
    ///   per table,
    ///     each sharing the id,
    ///     condition,
    ///     and sequence number.
    /// Later definitions overwrite earlier ones.
    pub fn load<B: BufRead>(src: B) -> Result<Self, ActionError> {
        let mut reader = xir::reader(src);
        let mut buf = Vec::new();
        let mut table = Self::new();

        loop {
            buf.clear();

            match reader.read_event_into(&mut buf)? {
                Event::Start(ele) => {
                    let attrs = Attrs::parse(&ele)?;

                    match attrs.element() {
                        "actions" => (),
                        "action" => {
                            for action in parse_action(&attrs)? {
                                table.add_overwrite(action);
                            }
                        }
                        other => {
                            return Err(ActionError::UnexpectedElement(
                                other.into(),
                            ))
                        }
                    }
                }
                Event::Eof => break,
                _ => (),
            }
        }

        Ok(table)
    }
}

fn parse_action(
    attrs: &Attrs,
) -> Result<ArrayVec<Action, SEQUENCE_TABLE_COUNT>, ActionError> {
    let name = attrs.get("name").ok_or(ActionError::MissingName)?;

    let sequence = attrs
        .get("sequence")
        .and_then(|s| s.parse::<i32>().ok())
        .filter(|&s| s > 0)
        .ok_or_else(|| ActionError::InvalidSequence {
            action: name.into(),
            value: attrs.get("sequence").map(String::from),
        })?;

    let condition = attrs.get("condition").map(String::from);

    let actions: ArrayVec<_, SEQUENCE_TABLE_COUNT> = SequenceTable::ALL
        .iter()
        .filter(|table| attrs.flag(table.as_str()))
        .map(|&table| Action::new(table, name, condition.clone(), Some(sequence)))
        .collect();

    if actions.is_empty() {
        return Err(ActionError::NoSequenceTable(name.into()));
    }

    Ok(actions)
}

/// Error loading an `actions` document.
///
/// These are configuration errors and are always fatal.
#[derive(Debug)]
pub enum ActionError {
    Xml(XirError),
    UnexpectedElement(String),
    /// An `action` element has no `name`.
    MissingName,
    /// An `action` has a missing or non-positive `sequence`.
    InvalidSequence {
        action: String,
        value: Option<String>,
    },
    /// An `action` is not scheduled in any sequence table.
    NoSequenceTable(String),
}

impl Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xml(e) => write!(f, "invalid actions document: {e}"),
            Self::UnexpectedElement(name) => {
                write!(f, "unexpected element `{name}` in actions document")
            }
            Self::MissingName => write!(f, "`action` is missing a `name`"),
            Self::InvalidSequence {
                action,
                value: Some(value),
            } => write!(
                f,
                "action `{action}` has invalid sequence `{value}`; \
                   it must be a positive integer"
            ),
            Self::InvalidSequence {
                action,
                value: None,
            } => write!(f, "action `{action}` is missing a sequence number"),
            Self::NoSequenceTable(action) => write!(
                f,
                "action `{action}` is not scheduled in any sequence table"
            ),
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Xml(e) => Some(e),
            _ => None,
        }
    }
}

impl Diagnostic for ActionError {
    fn id(&self) -> u32 {
        2
    }

    fn resource(&self) -> &'static str {
        "InvalidActionTable"
    }

    fn args(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl From<XirError> for ActionError {
    fn from(e: XirError) -> Self {
        Self::Xml(e)
    }
}

impl From<quick_xml::Error> for ActionError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.into())
    }
}
