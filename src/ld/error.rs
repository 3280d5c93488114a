// Linker errors
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

use crate::action::{ActionError, SequenceTable};
use crate::diagnose::{Diagnostic, Level};
use crate::obj::ObjError;
use crate::schema::SchemaError;
use crate::span::SourceLineNumberCollection;
use std::error::Error;
use std::fmt::{self, Display};
use std::io;

/// Error during linking or library combination.
///
/// Configuration errors
///   (such as a missing entry section or an unreadable input)
///   are returned as [`Err`] and abort the link.
/// All others are emitted per occurrence through
///   [`Messages`](crate::diagnose::Messages) so that as many as possible
///   are reported in a single pass.
#[derive(Debug)]
pub enum LinkError {
    /// An input file could not be opened.
    Io(String, io::Error),

    /// An input file could not be read as an object or library.
    Load(String, ObjError),

    /// The built-in table definitions could not be loaded.
    Schema(SchemaError),

    /// The built-in standard actions could not be loaded.
    Action(ActionError),

    /// No product,
    ///   module,
    ///   or patch creation section was found among the inputs.
    MissingEntrySection,

    /// More than one entry section was found;
    ///   each candidate is named along with its location.
    MultipleEntrySections(Vec<(String, Option<SourceLineNumberCollection>)>),

    /// A reference from a reachable section names no symbol.
    UnresolvedReference {
        name: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// Two rows of the same output table share a primary key.
    DuplicatePrimaryKey {
        table: String,
        key: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// Location of the first row of a [`Self::DuplicatePrimaryKey`].
    DuplicatePrimaryKeyLocation {
        table: String,
        key: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// Component groups contain one another.
    ComponentGroupCycle(Vec<String>),

    /// A complex reference pairs a parent and child of incompatible
    ///   types.
    UnsupportedComplexReference {
        reference: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// A component was declared primary in more than one feature or
    ///   module.
    MultiplePrimaryReferences {
        component: String,
        first: String,
        second: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// A feature was placed beneath more than one parent feature.
    MultipleFeatureParents {
        feature: String,
        first: String,
        second: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// An advertised resource belongs to a component that is not part
    ///   of any feature.
    OrphanedComponent {
        component: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// The target of a feature backlink does not exist in the output.
    MissingBacklinkTarget {
        symbol: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// An action has no sequence number of its own,
    ///   and none is provided by a standard action of the same name.
    MissingActionSequence {
        table: SequenceTable,
        action: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// An action names a sequence table that does not exist.
    UnknownSequenceTable {
        table: String,
        sources: Option<SourceLineNumberCollection>,
    },
}

impl Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "cannot open `{path}`: {e}"),
            Self::Load(path, e) => write!(f, "cannot load `{path}`: {e}"),
            Self::Schema(e) => Display::fmt(e, f),
            Self::Action(e) => Display::fmt(e, f),

            Self::MissingEntrySection => write!(
                f,
                "Could not find entry section in provided list of \
                   intermediates.  Supported entry section types are: \
                   Product, Module, PatchCreation."
            ),

            Self::MultipleEntrySections(candidates) => {
                write!(f, "Multiple entry sections found: ")?;

                let names = candidates
                    .iter()
                    .map(|(name, _)| format!("'{name}'"))
                    .collect::<Vec<_>>();

                write!(f, "{}.", names.join(", "))
            }

            Self::UnresolvedReference { name, .. } => {
                write!(f, "Unresolved reference to symbol '{name}'.")
            }

            Self::DuplicatePrimaryKey { table, key, .. } => write!(
                f,
                "Duplicate primary key '{key}' in table '{table}'."
            ),

            Self::DuplicatePrimaryKeyLocation { table, key, .. } => write!(
                f,
                "Location of primary key '{key}' of table '{table}' \
                   related to previous error."
            ),

            Self::ComponentGroupCycle(groups) => write!(
                f,
                "Component groups contain one another: {}.",
                groups.join(" -> ")
            ),

            Self::UnsupportedComplexReference { reference, .. } => {
                write!(f, "Unsupported complex reference: {reference}.")
            }

            Self::MultiplePrimaryReferences {
                component,
                first,
                second,
                ..
            } => write!(
                f,
                "Component '{component}' cannot be primary in both \
                   '{first}' and '{second}'."
            ),

            Self::MultipleFeatureParents {
                feature,
                first,
                second,
                ..
            } => write!(
                f,
                "Feature '{feature}' cannot be a child of both '{first}' \
                   and '{second}'."
            ),

            Self::OrphanedComponent { component, .. } => write!(
                f,
                "Component '{component}' has advertised resources but is \
                   not part of any feature."
            ),

            Self::MissingBacklinkTarget { symbol, .. } => write!(
                f,
                "Advertised resource '{symbol}' does not exist in the output."
            ),

            Self::MissingActionSequence { table, action, .. } => write!(
                f,
                "Action '{action}' of table '{table}' has no sequence \
                   number and is not a standard action."
            ),

            Self::UnknownSequenceTable { table, .. } => {
                write!(f, "Unknown sequence table '{table}'.")
            }
        }
    }
}

impl Error for LinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(_, e) => Some(e),
            Self::Load(_, e) => Some(e),
            Self::Schema(e) => Some(e),
            Self::Action(e) => Some(e),
            _ => None,
        }
    }
}

impl Diagnostic for LinkError {
    fn id(&self) -> u32 {
        match self {
            Self::Io(..) => 103,
            Self::Load(_, e) => e.id(),
            Self::Schema(e) => e.id(),
            Self::Action(e) => e.id(),
            Self::MissingEntrySection => 93,
            Self::MultipleEntrySections(_) => 89,
            Self::UnresolvedReference { .. } => 94,
            Self::DuplicatePrimaryKey { .. } => 130,
            Self::DuplicatePrimaryKeyLocation { .. } => 131,
            Self::ComponentGroupCycle(_) => 86,
            Self::UnsupportedComplexReference { .. } => 87,
            Self::MultiplePrimaryReferences { .. } => 90,
            Self::MultipleFeatureParents { .. } => 95,
            Self::OrphanedComponent { .. } => 96,
            Self::MissingBacklinkTarget { .. } => 97,
            Self::MissingActionSequence { .. } => 98,
            Self::UnknownSequenceTable { .. } => 99,
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            Self::Io(..) => "FileNotFound",
            Self::Load(_, e) => e.resource(),
            Self::Schema(e) => e.resource(),
            Self::Action(e) => e.resource(),
            Self::MissingEntrySection => "MissingEntrySection",
            Self::MultipleEntrySections(_) => "MultipleEntrySections",
            Self::UnresolvedReference { .. } => "UnresolvedReference",
            Self::DuplicatePrimaryKey { .. } => "DuplicatePrimaryKey",
            Self::DuplicatePrimaryKeyLocation { .. } => "DuplicatePrimaryKey2",
            Self::ComponentGroupCycle(_) => "ReferenceLoopDetected",
            Self::UnsupportedComplexReference { .. } => {
                "UnsupportedComplexReference"
            }
            Self::MultiplePrimaryReferences { .. } => "MultiplePrimaryReferences",
            Self::MultipleFeatureParents { .. } => "ComponentReferencedTwice",
            Self::OrphanedComponent { .. } => "OrphanedComponent",
            Self::MissingBacklinkTarget { .. } => "MissingFeatureBacklinkTarget",
            Self::MissingActionSequence { .. } => "StandardActionNotFound",
            Self::UnknownSequenceTable { .. } => "UnknownSequenceTable",
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            Self::Io(path, _) | Self::Load(path, _) => vec![path.clone()],
            Self::Schema(e) => e.args(),
            Self::Action(e) => e.args(),
            Self::MissingEntrySection => vec![],
            Self::MultipleEntrySections(candidates) => {
                candidates.iter().map(|(name, _)| name.clone()).collect()
            }
            Self::UnresolvedReference { name, .. } => vec![name.clone()],
            Self::DuplicatePrimaryKey { table, key, .. }
            | Self::DuplicatePrimaryKeyLocation { table, key, .. } => {
                vec![key.clone(), table.clone()]
            }
            Self::ComponentGroupCycle(groups) => groups.clone(),
            Self::UnsupportedComplexReference { reference, .. } => {
                vec![reference.clone()]
            }
            Self::MultiplePrimaryReferences {
                component,
                first,
                second,
                ..
            } => vec![component.clone(), first.clone(), second.clone()],
            Self::MultipleFeatureParents {
                feature,
                first,
                second,
                ..
            } => vec![feature.clone(), first.clone(), second.clone()],
            Self::OrphanedComponent { component, .. } => vec![component.clone()],
            Self::MissingBacklinkTarget { symbol, .. } => vec![symbol.clone()],
            Self::MissingActionSequence { table, action, .. } => {
                vec![table.to_string(), action.clone()]
            }
            Self::UnknownSequenceTable { table, .. } => vec![table.clone()],
        }
    }

    fn level(&self) -> Level {
        Level::Error
    }

    fn sources(&self) -> Option<&SourceLineNumberCollection> {
        match self {
            Self::Load(_, e) => e.sources(),
            Self::MultipleEntrySections(candidates) => {
                candidates.iter().find_map(|(_, sources)| sources.as_ref())
            }
            Self::UnresolvedReference { sources, .. }
            | Self::DuplicatePrimaryKey { sources, .. }
            | Self::DuplicatePrimaryKeyLocation { sources, .. }
            | Self::UnsupportedComplexReference { sources, .. }
            | Self::MultiplePrimaryReferences { sources, .. }
            | Self::MultipleFeatureParents { sources, .. }
            | Self::OrphanedComponent { sources, .. }
            | Self::MissingBacklinkTarget { sources, .. }
            | Self::MissingActionSequence { sources, .. }
            | Self::UnknownSequenceTable { sources, .. } => sources.as_ref(),
            _ => None,
        }
    }
}

impl From<SchemaError> for LinkError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

impl From<ActionError> for LinkError {
    fn from(e: ActionError) -> Self {
        Self::Action(e)
    }
}
