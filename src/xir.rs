// XML reading and writing primitives
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

//! Thin abstraction atop of [`quick_xml`].
//!
//! Every XML format handled by this crate
//!   (object files, libraries, table definitions, standard actions)
//!   is small, trusted, and element-oriented,
//!     so the only conveniences needed beyond [`quick_xml`] are
//!     collecting the attributes of an element ([`Attrs`]),
//!     reading the text content of an element ([`read_text`]),
//!     and emitting elements ([`XmlWriter`]).
//!
//! Readers are configured to expand empty elements,
//!   so `<a/>` is observed as a start followed by an end;
//!     consumers need only handle [`Event::Start`] and [`Event::End`].

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesText};
use std::error::Error;
use std::fmt::{self, Display};
use std::io::{self, BufRead, Write};

pub use quick_xml::events::{BytesStart, Event};

pub type XirResult<T> = Result<T, XirError>;

/// Construct a reader for one of our XML formats.
pub fn reader<B: BufRead>(src: B) -> quick_xml::Reader<B> {
    let mut reader = quick_xml::Reader::from_reader(src);
    reader.config_mut().expand_empty_elements = true;
    reader
}

/// Local name of an element,
///   ignoring any namespace prefix.
pub fn local_name(ele: &BytesStart) -> String {
    String::from_utf8_lossy(ele.local_name().as_ref()).into_owned()
}

/// Whether an attribute value represents an affirmative flag.
pub fn is_yes(value: &str) -> bool {
    matches!(value, "yes" | "true" | "1")
}

/// Attributes of a single element,
///   unescaped and in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attrs {
    ele: String,
    attrs: Vec<(String, String)>,
}

impl Attrs {
    pub fn parse(ele: &BytesStart) -> XirResult<Self> {
        let mut attrs = Vec::new();

        for attr in ele.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref())
                .into_owned();
            let value = attr.unescape_value()?.into_owned();

            attrs.push((key, value));
        }

        Ok(Self {
            ele: local_name(ele),
            attrs,
        })
    }

    /// Local name of the element these attributes belong to.
    pub fn element(&self) -> &str {
        &self.ele
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value,
    ///   failing if absent.
    pub fn require(&self, key: &str) -> Result<&str, MissingAttr> {
        self.get(key).ok_or_else(|| MissingAttr {
            ele: self.ele.clone(),
            attr: key.into(),
        })
    }

    /// Whether the attribute is present and affirmative
    ///   (see [`is_yes`]).
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).map(is_yes).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Read the text content of the element whose start was just read,
///   through its end.
///
/// Text and CDATA are concatenated;
///   nested elements are not expected and are an error.
/// An element with no content yields [`None`].
pub fn read_text<B: BufRead>(
    reader: &mut quick_xml::Reader<B>,
    buf: &mut Vec<u8>,
) -> XirResult<Option<String>> {
    let mut text: Option<String> = None;

    loop {
        buf.clear();

        match reader.read_event_into(buf)? {
            Event::Text(t) => {
                text.get_or_insert_with(String::new).push_str(&t.unescape()?)
            }
            Event::CData(c) => {
                let data = c.into_inner();
                text.get_or_insert_with(String::new)
                    .push_str(std::str::from_utf8(&data)?);
            }
            Event::End(_) => return Ok(text),
            Event::Start(ele) => {
                return Err(XirError::UnexpectedElement(local_name(&ele)))
            }
            Event::Eof => return Err(XirError::UnexpectedEof),
            _ => (),
        }
    }
}

/// Writer for our XML formats.
///
/// Output is indented by two spaces;
///   text content is written exactly as provided.
pub struct XmlWriter<W: Write> {
    writer: quick_xml::Writer<W>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(dest: W) -> Self {
        Self {
            writer: quick_xml::Writer::new_with_indent(dest, b' ', 2),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    pub fn declaration(&mut self) -> XirResult<&mut Self> {
        self.writer.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            Some("utf-8"),
            None,
        )))?;

        Ok(self)
    }

    /// Write an opening tag with the given attributes.
    ///
    /// Attributes with a value of [`None`] are omitted.
    pub fn open(
        &mut self,
        name: &str,
        attrs: &[(&str, Option<&str>)],
    ) -> XirResult<&mut Self> {
        let ele = Self::start(name, attrs);
        self.writer.write_event(Event::Start(ele))?;

        Ok(self)
    }

    pub fn close(&mut self, name: &str) -> XirResult<&mut Self> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;

        Ok(self)
    }

    /// Write a self-closing element.
    pub fn empty(
        &mut self,
        name: &str,
        attrs: &[(&str, Option<&str>)],
    ) -> XirResult<&mut Self> {
        let ele = Self::start(name, attrs);
        self.writer.write_event(Event::Empty(ele))?;

        Ok(self)
    }

    /// Write an element containing only text,
    ///   optionally as CDATA.
    pub fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, Option<&str>)],
        text: &str,
        cdata: bool,
    ) -> XirResult<&mut Self> {
        self.writer.write_event(Event::Start(Self::start(name, attrs)))?;

        if cdata {
            // `]]>` cannot appear within a CDATA section,
            //   so it is split across two adjacent sections.
            let mut rest = text;

            while let Some(end) = rest.find("]]>") {
                let (head, tail) = rest.split_at(end + 2);
                self.writer.write_event(Event::CData(BytesCData::new(head)))?;
                rest = tail;
            }

            self.writer.write_event(Event::CData(BytesCData::new(rest)))?;
        } else {
            self.writer.write_event(Event::Text(BytesText::new(text)))?;
        }

        self.writer.write_event(Event::End(BytesEnd::new(name)))?;

        Ok(self)
    }

    fn start<'a>(name: &'a str, attrs: &[(&'a str, Option<&'a str>)]) -> BytesStart<'a> {
        let mut ele = BytesStart::new(name);

        for (key, value) in attrs {
            if let Some(value) = value {
                ele.push_attribute((*key, *value));
            }
        }

        ele
    }
}

/// A required attribute was missing from an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAttr {
    pub ele: String,
    pub attr: String,
}

impl Display for MissingAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is missing required attribute `{}`", self.ele, self.attr)
    }
}

impl Error for MissingAttr {}

/// Error reading or writing XML.
#[derive(Debug)]
pub enum XirError {
    Xml(quick_xml::Error),
    Io(io::Error),
    Utf8(std::str::Utf8Error),
    /// An element appeared where only text was expected.
    UnexpectedElement(String),
    UnexpectedEof,
}

impl Display for XirError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xml(e) => write!(f, "malformed XML: {e}"),
            Self::Io(e) => Display::fmt(e, f),
            Self::Utf8(e) => write!(f, "invalid UTF-8: {e}"),
            Self::UnexpectedElement(name) => {
                write!(f, "unexpected element `{name}` in text content")
            }
            Self::UnexpectedEof => write!(f, "unexpected end of document"),
        }
    }
}

impl Error for XirError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Xml(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Utf8(e) => Some(e),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for XirError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e)
    }
}

impl From<AttrError> for XirError {
    fn from(e: AttrError) -> Self {
        Self::Xml(e.into())
    }
}

impl From<io::Error> for XirError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<std::str::Utf8Error> for XirError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::Utf8(e)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn first_start(xml: &str) -> Attrs {
        let mut reader = reader(xml.as_bytes());
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(ele) => return Attrs::parse(&ele).unwrap(),
                Event::Eof => panic!("no element"),
                _ => (),
            }
        }
    }

    #[test]
    fn attrs_are_unescaped_and_prefix_stripped() {
        let sut = first_start(r#"<x:foo a="1 &amp; 2" x:b="yes" />"#);

        assert_eq!("foo", sut.element());
        assert_eq!(Some("1 & 2"), sut.get("a"));
        assert!(sut.flag("b"));
        assert!(!sut.flag("c"));
    }

    #[test]
    fn require_reports_element_and_attr() {
        let sut = first_start(r#"<foo />"#);

        assert_eq!(
            Err(MissingAttr {
                ele: "foo".into(),
                attr: "bar".into()
            }),
            sut.require("bar")
        );
    }

    #[test]
    fn read_text_concatenates_text_and_cdata() {
        let mut reader = reader(&b"<f>a &lt; <![CDATA[<b>]]></f>"[..]);
        let mut buf = Vec::new();

        assert!(matches!(
            reader.read_event_into(&mut buf).unwrap(),
            Event::Start(_)
        ));

        assert_eq!(
            Some("a < <b>".to_string()),
            read_text(&mut reader, &mut buf).unwrap()
        );
    }

    #[test]
    fn read_text_of_empty_element_is_none() {
        let mut reader = reader(&b"<f/>"[..]);
        let mut buf = Vec::new();

        reader.read_event_into(&mut buf).unwrap();
        assert_eq!(None, read_text(&mut reader, &mut buf).unwrap());
    }

    #[test]
    fn writer_omits_absent_attributes() {
        let mut sut = XmlWriter::new(Vec::new());
        sut.empty("foo", &[("a", Some("1")), ("b", None)]).unwrap();

        assert_eq!(
            r#"<foo a="1"/>"#,
            String::from_utf8(sut.into_inner()).unwrap().trim()
        );
    }
}
