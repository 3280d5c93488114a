// Source line number chains
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

//! Mapping of rows and messages back to their authored source.
//!
//! Object files do not retain byte offsets;
//!   the compiler records a chain of `file*line` pairs instead,
//!     where the first entry is the location of the element itself and
//!     each subsequent entry is the location of the include that brought
//!     the previous file in.
//! A [`SourceLineNumberCollection`] is that chain.
//!
//! The encoded form is `file*line|file*line|…`.
//! A line number may be omitted (`file`),
//!   in which case only the file is known.
//!
//! ```
//! use wixer::span::SourceLineNumberCollection;
//!
//! let chain = SourceLineNumberCollection::parse("product.wxs*12|main.wxs*3");
//!
//! assert_eq!(2, chain.len());
//! assert_eq!("product.wxs(12)", chain.to_string());
//! assert_eq!("product.wxs*12|main.wxs*3", chain.encode());
//! ```

use std::fmt::{self, Display};
use std::slice;

/// A single `file(line)` location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLineNumber {
    file: String,
    line: Option<u32>,
}

impl SourceLineNumber {
    pub fn new<S: Into<String>>(file: S, line: Option<u32>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// Parse a single `file*line` entry.
    ///
    /// A line that is not a valid number is treated as absent rather than
    ///   as an error,
    ///     since source information is purely diagnostic.
    fn parse(entry: &str) -> Self {
        match entry.rsplit_once('*') {
            Some((file, line)) => Self::new(file, line.parse().ok()),
            None => Self::new(entry, None),
        }
    }

    fn encode_into(&self, dest: &mut String) {
        dest.push_str(&self.file);

        if let Some(line) = self.line {
            dest.push('*');
            dest.push_str(&line.to_string());
        }
    }
}

impl Display for SourceLineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}({})", self.file, line),
            None => write!(f, "{}", self.file),
        }
    }
}

/// Ordered chain of source locations,
///   innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourceLineNumberCollection(Vec<SourceLineNumber>);

impl SourceLineNumberCollection {
    /// Parse the encoded `file*line|file*line` form.
    ///
    /// Empty entries are skipped.
    pub fn parse(encoded: &str) -> Self {
        Self(
            encoded
                .split('|')
                .filter(|entry| !entry.is_empty())
                .map(SourceLineNumber::parse)
                .collect(),
        )
    }

    /// Chain consisting of a single location.
    pub fn single<S: Into<String>>(file: S, line: Option<u32>) -> Self {
        Self(vec![SourceLineNumber::new(file, line)])
    }

    pub fn encode(&self) -> String {
        let mut dest = String::new();

        for (i, sln) in self.0.iter().enumerate() {
            if i > 0 {
                dest.push('|');
            }

            sln.encode_into(&mut dest);
        }

        dest
    }

    /// The location of the element itself.
    pub fn first(&self) -> Option<&SourceLineNumber> {
        self.0.first()
    }

    /// Locations of the includes leading to [`Self::first`].
    pub fn includes(&self) -> &[SourceLineNumber] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, SourceLineNumber> {
        self.0.iter()
    }
}

impl Display for SourceLineNumberCollection {
    /// Only the innermost location is displayed;
    ///   see [`Self::includes`] for the remainder of the chain.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first() {
            Some(sln) => Display::fmt(sln, f),
            None => Ok(()),
        }
    }
}

impl From<SourceLineNumber> for SourceLineNumberCollection {
    fn from(sln: SourceLineNumber) -> Self {
        Self(vec![sln])
    }
}

impl FromIterator<SourceLineNumber> for SourceLineNumberCollection {
    fn from_iter<T: IntoIterator<Item = SourceLineNumber>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_include_chain() {
        let sut = SourceLineNumberCollection::parse("a.wxs*12|b.wxi*3|c.wxs");

        assert_eq!(
            vec![
                SourceLineNumber::new("a.wxs", Some(12)),
                SourceLineNumber::new("b.wxi", Some(3)),
                SourceLineNumber::new("c.wxs", None),
            ],
            sut.iter().cloned().collect::<Vec<_>>()
        );

        assert_eq!(2, sut.includes().len());
    }

    #[test]
    fn encode_is_inverse_of_parse() {
        let encoded = "a.wxs*12|b.wxi*3|c.wxs";
        assert_eq!(encoded, SourceLineNumberCollection::parse(encoded).encode());
    }

    #[test]
    fn bad_line_number_is_dropped() {
        let sut = SourceLineNumberCollection::parse("a.wxs*abc");
        assert_eq!(Some(&SourceLineNumber::new("a.wxs", None)), sut.first());
    }

    // File names may themselves contain `*` only if they also carry a line.
    #[test]
    fn line_split_uses_last_star() {
        let sut = SourceLineNumberCollection::parse("we*ird.wxs*7");
        assert_eq!(
            Some(&SourceLineNumber::new("we*ird.wxs", Some(7))),
            sut.first()
        );
    }

    #[test]
    fn empty_chain_displays_nothing() {
        let sut = SourceLineNumberCollection::parse("");

        assert!(sut.is_empty());
        assert_eq!("", sut.to_string());
    }
}
