// Symbols and references
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

//! Symbols,
//!   references,
//!   and the structural edges between sections.
//!
//! A [`Symbol`] is the globally unique name of a row or section;
//!   it is the currency of resolution.
//! Row symbols are named after their table and symbol columns
//!   (see [`Row::symbol_name`](crate::row::Row::symbol_name)),
//!     and section symbols after their type and id
//!     (e.g. `Fragment:FragA`).
//!
//! A [`Reference`] is a request by one section for a symbol defined
//!   (possibly) by another.
//! A [`ComplexReference`] is a parent/child containment edge,
//!   such as a feature owning a component;
//!     it implies reachability even in the absence of any [`Reference`].
//! A [`FeatureBacklink`] associates an advertised resource with the
//!   feature that ultimately owns it.

use crate::diagnose::{Diagnostic, Level};
use crate::span::SourceLineNumberCollection;
use fxhash::FxHashMap;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

/// Index of a section among all sections participating in a link.
pub type SectionIndex = usize;

/// Location of a row within a section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowRef {
    pub table: String,
    pub index: usize,
}

/// A uniquely named handle to a row or section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    section: SectionIndex,
    row: Option<RowRef>,
    sources: Option<SourceLineNumberCollection>,
}

impl Symbol {
    pub fn new<S: Into<String>>(
        name: S,
        section: SectionIndex,
        row: Option<RowRef>,
        sources: Option<SourceLineNumberCollection>,
    ) -> Self {
        Self {
            name: name.into(),
            section,
            row,
            sources,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Section defining this symbol.
    pub fn section(&self) -> SectionIndex {
        self.section
    }

    /// Row backing this symbol,
    ///   or [`None`] if this is the symbol of a section.
    pub fn row(&self) -> Option<&RowRef> {
        self.row.as_ref()
    }

    pub fn sources(&self) -> Option<&SourceLineNumberCollection> {
        self.sources.as_ref()
    }
}

/// A request for the symbol `symbol` of table `table`.
///
/// References are ordered and hashed by their full name `table:symbol`.
#[derive(Debug, Clone)]
pub struct Reference {
    table: String,
    symbol: String,
    name: String,
}

impl Reference {
    pub fn new<T: Into<String>, S: Into<String>>(table: T, symbol: S) -> Self {
        let table = table.into();
        let symbol = symbol.into();
        let name = format!("{table}:{symbol}");

        Self {
            table,
            symbol,
            name,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Name of the referenced [`Symbol`].
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

str_enum! {
    /// Type of the parent of a [`ComplexReference`].
    pub enum ComplexReferenceParentType {
        Feature => "Feature",
        ComponentGroup => "ComponentGroup",
        Module => "Module",
    }
}

impl ComplexReferenceParentType {
    fn symbol_prefix(&self) -> &'static str {
        match self {
            Self::Feature => "Feature",
            Self::ComponentGroup => "WixComponentGroup",
            Self::Module => "Module",
        }
    }
}

str_enum! {
    /// Type of the child of a [`ComplexReference`].
    pub enum ComplexReferenceChildType {
        Component => "Component",
        ComponentGroup => "ComponentGroup",
        Feature => "Feature",
        Fragment => "Fragment",
        Module => "Module",
    }
}

impl ComplexReferenceChildType {
    fn symbol_prefix(&self) -> &'static str {
        match self {
            Self::Component => "Component",
            Self::ComponentGroup => "WixComponentGroup",
            Self::Feature => "Feature",
            Self::Fragment => "Fragment",
            // a module child is merged via its `WixMerge` row
            Self::Module => "WixMerge",
        }
    }
}

/// Structural parent/child edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComplexReference {
    parent_type: ComplexReferenceParentType,
    parent: String,
    parent_language: Option<String>,
    child_type: ComplexReferenceChildType,
    child: String,
    primary: bool,
}

impl ComplexReference {
    /// Construct a complex reference,
    ///   failing if a `parent_language` is given for a parent that is
    ///   not a module.
    pub fn new<P: Into<String>, C: Into<String>>(
        parent_type: ComplexReferenceParentType,
        parent: P,
        parent_language: Option<String>,
        child_type: ComplexReferenceChildType,
        child: C,
        primary: bool,
    ) -> Result<Self, ComplexReferenceError> {
        let parent = parent.into();

        if parent_language.is_some()
            && parent_type != ComplexReferenceParentType::Module
        {
            return Err(ComplexReferenceError::LanguageWithoutModule(
                parent_type,
                parent,
            ));
        }

        Ok(Self {
            parent_type,
            parent,
            parent_language,
            child_type,
            child: child.into(),
            primary,
        })
    }

    pub fn parent_type(&self) -> ComplexReferenceParentType {
        self.parent_type
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn parent_language(&self) -> Option<&str> {
        self.parent_language.as_deref()
    }

    pub fn child_type(&self) -> ComplexReferenceChildType {
        self.child_type
    }

    pub fn child(&self) -> &str {
        &self.child
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Name of the symbol of the parent.
    pub fn parent_symbol(&self) -> String {
        format!("{}:{}", self.parent_type.symbol_prefix(), self.parent)
    }

    /// Name of the symbol of the child.
    pub fn child_symbol(&self) -> String {
        format!("{}:{}", self.child_type.symbol_prefix(), self.child)
    }
}

impl Display for ComplexReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} `{}` -> {} `{}`",
            self.parent_type, self.parent, self.child_type, self.child
        )
    }
}

/// A [`ComplexReference`] could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplexReferenceError {
    /// A parent language was provided for a parent that is not a module.
    LanguageWithoutModule(ComplexReferenceParentType, String),
}

impl Display for ComplexReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LanguageWithoutModule(ty, parent) => write!(
                f,
                "parent language is only valid for a Module parent, \
                   but {ty} `{parent}` was given one"
            ),
        }
    }
}

impl Error for ComplexReferenceError {}

str_enum! {
    /// Kind of advertised resource of a [`FeatureBacklink`].
    pub enum FeatureBacklinkType {
        Class => "Class",
        Extension => "Extension",
        Shortcut => "Shortcut",
        PublishComponent => "PublishComponent",
        TypeLib => "TypeLib",
        Assembly => "Assembly",
    }
}

impl FeatureBacklinkType {
    /// Table holding the advertised resource.
    pub fn target_table(&self) -> &'static str {
        match self {
            Self::Class => "Class",
            Self::Extension => "Extension",
            Self::Shortcut => "Shortcut",
            Self::PublishComponent => "PublishComponent",
            Self::TypeLib => "TypeLib",
            Self::Assembly => "MsiAssembly",
        }
    }

    /// Index of the column of [`Self::target_table`] that receives the
    ///   owning feature.
    pub fn feature_column(&self) -> usize {
        match self {
            Self::Class => 11,
            Self::Extension => 4,
            // advertised shortcuts target their feature
            Self::Shortcut => 4,
            Self::PublishComponent => 4,
            Self::TypeLib => 6,
            Self::Assembly => 1,
        }
    }
}

/// Association of an advertised resource with the feature owning its
///   component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureBacklink {
    component: String,
    ty: FeatureBacklinkType,
    target: String,
}

impl FeatureBacklink {
    /// `target` is the symbol id of the resource within
    ///   [`FeatureBacklinkType::target_table`].
    pub fn new<C: Into<String>, T: Into<String>>(
        component: C,
        ty: FeatureBacklinkType,
        target: T,
    ) -> Self {
        Self {
            component: component.into(),
            ty,
            target: target.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn ty(&self) -> FeatureBacklinkType {
        self.ty
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Full name of the symbol of the advertised resource.
    pub fn target_symbol(&self) -> String {
        format!("{}:{}", self.ty.target_table(), self.target)
    }
}

/// Every symbol of a link,
///   by name.
///
/// Symbol names must be unique;
///   inserting a name that already exists is a [`DuplicateSymbolError`],
///     but every contributing symbol is retained so that later duplicates
///     can be reported against all prior locations.
#[derive(Debug, Default)]
pub struct SymbolCollection {
    symbols: FxHashMap<String, Vec<Symbol>>,
}

impl SymbolCollection {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, symbol: Symbol) -> Result<(), DuplicateSymbolError> {
        let bucket = self.symbols.entry(symbol.name.clone()).or_default();
        bucket.push(symbol);

        match bucket.len() {
            1 => Ok(()),
            _ => Err(DuplicateSymbolError::new(bucket)),
        }
    }

    /// The symbol of the given name.
    ///
    /// If the name is duplicated,
    ///   the first definition is returned.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name).and_then(|bucket| bucket.first())
    }

    /// Every definition of the given name.
    pub fn get_all(&self, name: &str) -> &[Symbol] {
        self.symbols.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A symbol name was defined more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSymbolError {
    name: String,
    /// Source locations of every definition,
    ///   in order of definition.
    locations: Vec<Option<SourceLineNumberCollection>>,
}

impl DuplicateSymbolError {
    fn new(bucket: &[Symbol]) -> Self {
        Self {
            name: bucket.first().map(|s| s.name.clone()).unwrap_or_default(),
            locations: bucket.iter().map(|s| s.sources.clone()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locations(&self) -> &[Option<SourceLineNumberCollection>] {
        &self.locations
    }

    /// Companion diagnostics identifying every prior definition.
    pub fn related(&self) -> Vec<DuplicateSymbolLocation> {
        let prior = self.locations.len().saturating_sub(1);

        self.locations
            .iter()
            .take(prior)
            .map(|sources| DuplicateSymbolLocation {
                name: self.name.clone(),
                sources: sources.clone(),
            })
            .collect()
    }
}

impl Display for DuplicateSymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duplicate symbol '{}' found.", self.name)
    }
}

impl Error for DuplicateSymbolError {}

impl Diagnostic for DuplicateSymbolError {
    fn id(&self) -> u32 {
        91
    }

    fn resource(&self) -> &'static str {
        "DuplicateSymbol"
    }

    fn args(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    /// The location of the most recent definition.
    fn sources(&self) -> Option<&SourceLineNumberCollection> {
        self.locations.last().and_then(Option::as_ref)
    }
}

/// Location of an earlier definition of a duplicated symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSymbolLocation {
    name: String,
    sources: Option<SourceLineNumberCollection>,
}

impl Display for DuplicateSymbolLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Location of symbol '{}' related to previous error.",
            self.name
        )
    }
}

impl Error for DuplicateSymbolLocation {}

impl Diagnostic for DuplicateSymbolLocation {
    fn id(&self) -> u32 {
        92
    }

    fn resource(&self) -> &'static str {
        "DuplicateSymbol2"
    }

    fn args(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn level(&self) -> Level {
        Level::Error
    }

    fn sources(&self) -> Option<&SourceLineNumberCollection> {
        self.sources.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sym(name: &str, section: SectionIndex, file: &str) -> Symbol {
        Symbol::new(
            name,
            section,
            None,
            Some(SourceLineNumberCollection::single(file, Some(1))),
        )
    }

    #[test]
    fn reference_orders_by_full_name() {
        let a = Reference::new("A", "z");
        let b = Reference::new("A0", "a");

        // `:` sorts after `0`
        assert!(b < a);
        assert_eq!("A:z", a.name());
        assert_eq!(Reference::new("A", "z"), a);
    }

    #[test]
    fn complex_reference_language_requires_module() {
        assert!(ComplexReference::new(
            ComplexReferenceParentType::Module,
            "Mod",
            Some("1033".into()),
            ComplexReferenceChildType::Component,
            "Comp",
            false,
        )
        .is_ok());

        assert_eq!(
            Err(ComplexReferenceError::LanguageWithoutModule(
                ComplexReferenceParentType::Feature,
                "Feat".into()
            )),
            ComplexReference::new(
                ComplexReferenceParentType::Feature,
                "Feat",
                Some("1033".into()),
                ComplexReferenceChildType::Component,
                "Comp",
                false,
            )
        );
    }

    #[test]
    fn complex_reference_symbol_names() {
        let sut = ComplexReference::new(
            ComplexReferenceParentType::ComponentGroup,
            "Group",
            None,
            ComplexReferenceChildType::Module,
            "Merge",
            false,
        )
        .unwrap();

        assert_eq!("WixComponentGroup:Group", sut.parent_symbol());
        assert_eq!("WixMerge:Merge", sut.child_symbol());
    }

    #[test]
    fn backlink_target_symbol() {
        let sut = FeatureBacklink::new("Comp", FeatureBacklinkType::Assembly, "Comp");

        assert_eq!("MsiAssembly:Comp", sut.target_symbol());
        assert_eq!(1, sut.ty().feature_column());
    }

    #[test]
    fn duplicate_symbol_names_every_location() {
        let mut sut = SymbolCollection::new();

        assert!(sut.insert(sym("Component:A", 0, "a.wxs")).is_ok());
        assert!(sut.insert(sym("Component:B", 0, "a.wxs")).is_ok());

        let err = sut.insert(sym("Component:A", 1, "b.wxs")).unwrap_err();
        assert_eq!("Component:A", err.name());
        assert_eq!(2, err.locations().len());
        assert_eq!(
            Some("b.wxs"),
            err.sources().and_then(|s| s.first()).map(|s| s.file())
        );

        let related = err.related();
        assert_eq!(1, related.len());
        assert_eq!(
            Some("a.wxs"),
            related[0].sources().and_then(|s| s.first()).map(|s| s.file())
        );

        // a third definition reports all prior two
        let err = sut.insert(sym("Component:A", 2, "c.wxs")).unwrap_err();
        assert_eq!(2, err.related().len());

        // the first definition wins lookup
        assert_eq!(0, sut.get("Component:A").unwrap().section());
        assert_eq!(3, sut.get_all("Component:A").len());
        assert_eq!(2, sut.len());
    }
}
