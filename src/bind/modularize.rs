// Identifier rewriting for merge modules
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

//! Modularization of identifiers.
//!
//! Rows of a merge module are merged into arbitrary products,
//!   alongside rows of other merge modules.
//! To prevent identifiers of distinct modules from colliding,
//!   each identifier of a module is suffixed with the module's GUID
//!   (for example `INSTALLDIR` becomes `INSTALLDIR.ABCD1234`).
//!
//! How a value is rewritten depends on the [`ColumnModularizeType`] of
//!   its column:
//!
//!   - `Column` values are a single identifier;
//!   - `Property` values are formatted strings in which only bracketed
//!       references (`[PROP]`, `[#File]`, `[!File]`, `[$Component]`) are
//!       identifiers;
//!   - `Condition` values are conditional expressions whose bare words
//!       are identifiers,
//!         except for operators and anything within a string literal or
//!         an environment variable reference;
//!   - `Icon` values receive the GUID before their extension;
//!   - `CompanionFile` values are identifiers unless they begin with a
//!       digit,
//!         in which case they are a version;
//!   - `SemicolonDelimited` values are lists of identifiers;
//!   - `ControlEventArgument` values are treated as either `Column` or
//!       `Property` depending on the control event
//!       (see [`COLUMN_CONTROL_EVENTS`]).
//!
//! Standard properties and standard actions are never rewritten,
//!   nor is any identifier of the ignore list.

use crate::diagnose::{Diagnostic, Level};
use crate::row::Row;
use crate::schema::ColumnModularizeType;
use fxhash::FxHashSet;
use memchr::{memchr, memchr2, memrchr};
use static_assertions::const_assert;
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display};

/// Properties defined by the installer itself.
///
/// Must remain sorted by byte value;
///   it is searched using [`slice::binary_search`].
pub const STANDARD_PROPERTIES: &[&str] = &[
    "AFTERREBOOT", "ALLUSERS", "ARPAUTHORIZEDCDFPREFIX", "ARPCOMMENTS",
    "ARPCONTACT", "ARPHELPLINK", "ARPHELPTELEPHONE", "ARPINSTALLLOCATION",
    "ARPNOMODIFY", "ARPNOREMOVE", "ARPNOREPAIR", "ARPPRODUCTICON", "ARPREADME",
    "ARPSIZE", "ARPSYSTEMCOMPONENT", "ARPURLINFOABOUT", "ARPURLUPDATEINFO",
    "AVAILABLEFREEREG", "AdminProperties", "AdminToolsFolder", "AdminUser",
    "AllowProductCodeMismatches", "AllowProductVersionMajorMismatches",
    "AppDataFolder", "BorderSide", "BorderTop", "CCP_DRIVE", "COMPADDLOCAL",
    "COMPADDSOURCE", "COMPANYNAME", "CaptionHeight", "ColorBits",
    "CommonAppDataFolder", "CommonFiles64Folder", "CommonFilesFolder",
    "ComputerName", "CostingComplete", "DISABLEADVTSHORTCUTS",
    "DISABLEROLLBACK", "Date", "DefaultUIFont", "DesktopFolder", "DiskPrompt",
    "EXECUTEACTION", "EXECUTEMODE", "EnableUserControl", "FASTOEM",
    "FILEADDDEFAULT", "FILEADDLOCAL", "FILEADDSOURCE", "FavoritesFolder",
    "FontsFolder", "INSTALLLEVEL", "Installed", "Intel", "Intel64", "LIMITUI",
    "LOGACTION", "LocalAppDataFolder", "LogonUser", "MEDIAPACKAGEPATH",
    "MSINODISABLEMEDIA", "Manufacturer", "MsiNTProductType",
    "MsiNetAssemblySupport", "MsiWin32AssemblySupport", "MyPicturesFolder",
    "NOCOMPANYNAME", "NOUSERNAME", "NetHoodFolder", "OLEAdvtSupport",
    "OriginalDatabase", "OutOfDiskSpace", "OutOfNoRbDiskSpace", "PATCH",
    "PIDKEY", "PIDTemplate", "PROMPTROLLBACKCOST", "ParentOriginalDatabase",
    "ParentProductCode", "PersonalFolder", "PhysicalMemory", "Preselected",
    "PrimaryVolumePath", "PrimaryVolumeSpaceAvailable",
    "PrimaryVolumeSpaceRequired", "PrintHoodFolder", "Privileged",
    "ProductCode", "ProductID", "ProductLanguage", "ProductName",
    "ProductState", "ProductVersion", "ProgramFiles64Folder",
    "ProgramFilesFolder", "ProgramMenuFolder", "REBOOT", "REBOOTPROMPT",
    "REINSTALL", "REINSTALLMODE", "REMOVE", "RESUME", "ROOTDRIVE",
    "RecentFolder", "RemoveAdminTS", "ReplacedInUseFiles",
    "RestrictedUserControl", "RollbackDisabled", "SEQUENCE", "SHORTFILENAMES",
    "SOURCELIST", "ScreenX", "ScreenY", "SendToFolder", "ServicePackLevel",
    "ServicePackLevelMinor", "SharedWindows", "ShellAdvtSupport", "SourceDir",
    "StartMenuFolder", "StartupFolder", "System16Folder", "System64Folder",
    "SystemFolder", "SystemLanguageID", "TARGETDIR", "TRANSFORMS",
    "TRANSFORMSATSOURCE", "TRANSFORMSSECURE", "TTCSupport", "TempFolder",
    "TemplateFolder", "TerminalServer", "TextHeight", "Time", "UILevel",
    "UPGRADINGPRODUCTCODE", "USERNAME", "UpdateStarted", "UpgradeCode",
    "UserLanguageID", "UserSID", "Version9X", "VersionDatabase", "VersionMsi",
    "VersionNT", "VersionNT64", "VirtualMemory", "WindowsBuild",
    "WindowsFolder", "WindowsVolume",
];

/// Control events whose argument is an identifier
///   (a dialog, action, or directory)
///   rather than a formatted string.
pub const COLUMN_CONTROL_EVENTS: &[&str] = &[
    "CheckExistingTargetPath",
    "CheckTargetPath",
    "DoAction",
    "NewDialog",
    "SelectionBrowse",
    "SetTargetPath",
    "SpawnDialog",
    "SpawnWaitDialog",
];

/// Operators of conditional expressions.
const CONDITION_KEYWORDS: &[&str] = &["AND", "EQV", "IMP", "NOT", "OR", "XOR"];

const fn str_lt(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut i = 0;

    while i < a.len() && i < b.len() {
        if a[i] != b[i] {
            return a[i] < b[i];
        }
        i += 1;
    }

    a.len() < b.len()
}

const fn is_sorted(list: &[&str]) -> bool {
    let mut i = 1;

    while i < list.len() {
        if !str_lt(list[i - 1], list[i]) {
            return false;
        }
        i += 1;
    }

    true
}

const_assert!(is_sorted(STANDARD_PROPERTIES));
const_assert!(is_sorted(COLUMN_CONTROL_EVENTS));
const_assert!(is_sorted(CONDITION_KEYWORDS));

/// Whether `name` is a property defined by the installer.
pub fn is_standard_property(name: &str) -> bool {
    STANDARD_PROPERTIES.binary_search(&name).is_ok()
}

fn is_identifier(value: &str) -> bool {
    let mut bytes = value.bytes();

    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
}

/// A value could not be modularized and was left as authored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModularizeError {
    /// A conditional expression contains a string literal that is never
    ///   closed.
    UnterminatedString(String),
}

impl Display for ModularizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString(value) => write!(
                f,
                "The condition '{value}' contains an unterminated string \
                   literal and will not be modularized."
            ),
        }
    }
}

impl Error for ModularizeError {}

impl Diagnostic for ModularizeError {
    fn id(&self) -> u32 {
        1090
    }

    fn resource(&self) -> &'static str {
        "UnterminatedConditionString"
    }

    fn args(&self) -> Vec<String> {
        match self {
            Self::UnterminatedString(value) => vec![value.clone()],
        }
    }

    fn level(&self) -> Level {
        Level::Warning
    }
}

/// Rewrites identifiers using the GUID of a merge module.
#[derive(Debug)]
pub struct Modularizer<'a> {
    guid: &'a str,
    ignored: &'a FxHashSet<String>,
    standard_actions: &'a FxHashSet<String>,
}

impl<'a> Modularizer<'a> {
    pub fn new(
        guid: &'a str,
        ignored: &'a FxHashSet<String>,
        standard_actions: &'a FxHashSet<String>,
    ) -> Self {
        Self {
            guid,
            ignored,
            standard_actions,
        }
    }

    /// Whether `ident` must be left untouched.
    fn is_exempt(&self, ident: &str) -> bool {
        ident.is_empty()
            || self.ignored.contains(ident)
            || is_standard_property(ident)
            || self.standard_actions.contains(ident)
    }

    fn suffix(&self, ident: &str) -> String {
        format!("{}.{}", ident, self.guid)
    }

    /// Rewrite `value` of a column of type `ty`.
    ///
    /// `ControlEventArgument` values are rewritten as formatted strings;
    ///   use [`Self::control_event_argument`] where the event is known.
    pub fn value<'v>(
        &self,
        ty: ColumnModularizeType,
        value: &'v str,
    ) -> Result<Cow<'v, str>, ModularizeError> {
        use ColumnModularizeType as Ty;

        Ok(match ty {
            Ty::None => Cow::Borrowed(value),
            Ty::Column => self.column(value),
            Ty::Property | Ty::ControlEventArgument => self.formatted(value),
            Ty::Condition => self.condition(value)?,
            Ty::Icon => self.icon(value),
            Ty::CompanionFile => match value.bytes().next() {
                Some(b) if b.is_ascii_digit() => Cow::Borrowed(value),
                _ => self.column(value),
            },
            Ty::SemicolonDelimited => self.semicolon_delimited(value),
        })
    }

    /// Rewrite the argument of the control event `event`.
    pub fn control_event_argument<'v>(&self, event: &str, value: &'v str) -> Cow<'v, str> {
        if COLUMN_CONTROL_EVENTS.binary_search(&event).is_ok() {
            self.column(value)
        } else {
            self.formatted(value)
        }
    }

    /// Text of every field of `row`,
    ///   modularized according to its column.
    ///
    /// The argument of a `ControlEvent` row is rewritten according to the
    ///   event of the same row.
    pub fn row_text(&self, row: &Row) -> Result<Vec<Option<String>>, ModularizeError> {
        let event = row
            .definition()
            .column_index("Event")
            .and_then(|i| row.get_str(i))
            .map(String::from);

        row.fields()
            .iter()
            .map(|field| {
                let text = match field.to_text() {
                    Some(text) => text,
                    None => return Ok(None),
                };

                let column = field.column();

                if column.is_numeric() {
                    return Ok(Some(text));
                }

                let ty = column.modularize_type();

                let rewritten = match (ty, &event) {
                    (ColumnModularizeType::ControlEventArgument, Some(event)) => {
                        self.control_event_argument(event, &text).into_owned()
                    }
                    _ => self.value(ty, &text)?.into_owned(),
                };

                Ok(Some(rewritten))
            })
            .collect()
    }

    fn column<'v>(&self, value: &'v str) -> Cow<'v, str> {
        if self.is_exempt(value) || !is_identifier(value) {
            Cow::Borrowed(value)
        } else {
            Cow::Owned(self.suffix(value))
        }
    }

    fn icon<'v>(&self, value: &'v str) -> Cow<'v, str> {
        if self.is_exempt(value) {
            return Cow::Borrowed(value);
        }

        match memrchr(b'.', value.as_bytes()) {
            Some(dot) => Cow::Owned(format!(
                "{}.{}{}",
                &value[..dot],
                self.guid,
                &value[dot..]
            )),
            None => Cow::Owned(self.suffix(value)),
        }
    }

    fn semicolon_delimited<'v>(&self, value: &'v str) -> Cow<'v, str> {
        if memchr(b';', value.as_bytes()).is_none() {
            return self.column(value);
        }

        Cow::Owned(
            value
                .split(';')
                .map(|token| self.column(token))
                .collect::<Vec<_>>()
                .join(";"),
        )
    }

    /// Rewrite the bracketed references of a formatted string.
    ///
    /// Nested brackets resolve from the innermost outward at install
    ///   time;
    ///     only the innermost reference is an identifier.
    fn formatted<'v>(&self, value: &'v str) -> Cow<'v, str> {
        let bytes = value.as_bytes();

        if memchr(b'[', bytes).is_none() {
            return Cow::Borrowed(value);
        }

        let mut out = String::with_capacity(value.len() + self.guid.len() + 1);
        let mut pos = 0;

        while let Some(open) = memchr(b'[', &bytes[pos..]).map(|i| pos + i) {
            let close = match memchr(b']', &bytes[open + 1..]) {
                Some(i) => open + 1 + i,
                None => break,
            };

            let open = memrchr(b'[', &bytes[open..close])
                .map(|i| open + i)
                .unwrap_or(open);

            out.push_str(&value[pos..=open]);
            out.push_str(&self.formatted_reference(&value[open + 1..close]));
            out.push(']');

            pos = close + 1;
        }

        out.push_str(&value[pos..]);
        Cow::Owned(out)
    }

    /// Rewrite the text between a pair of brackets.
    ///
    /// File (`#`, `!`) and component (`$`) references are rewritten after
    ///   their sigil;
    ///     environment variables (`%`) and escapes (`\`, `~`) are not
    ///     identifiers.
    fn formatted_reference<'v>(&self, reference: &'v str) -> Cow<'v, str> {
        let (sigil, ident) = match reference.as_bytes().first() {
            Some(b'#' | b'!' | b'$') => reference.split_at(1),
            _ => ("", reference),
        };

        if !is_identifier(ident) || self.is_exempt(ident) {
            return Cow::Borrowed(reference);
        }

        Cow::Owned(format!("{}{}", sigil, self.suffix(ident)))
    }

    /// Rewrite the bare identifiers of a conditional expression.
    fn condition<'v>(&self, value: &'v str) -> Result<Cow<'v, str>, ModularizeError> {
        let bytes = value.as_bytes();

        if !bytes.iter().any(|b| b.is_ascii_alphabetic() || *b == b'_') {
            return Ok(Cow::Borrowed(value));
        }

        let mut out = String::with_capacity(value.len() + self.guid.len() + 1);
        let mut pos = 0;

        while pos < bytes.len() {
            let b = bytes[pos];

            match b {
                b'"' => {
                    let end = memchr(b'"', &bytes[pos + 1..])
                        .map(|i| pos + 1 + i)
                        .ok_or_else(|| ModularizeError::UnterminatedString(value.into()))?;

                    out.push_str(&value[pos..=end]);
                    pos = end + 1;
                }

                // environment variable
                b'%' => {
                    let end = scan_identifier(bytes, pos + 1);
                    out.push_str(&value[pos..end]);
                    pos = end;
                }

                b'0'..=b'9' => {
                    let end = scan_identifier(bytes, pos);
                    out.push_str(&value[pos..end]);
                    pos = end;
                }

                _ if b.is_ascii_alphabetic() || b == b'_' => {
                    let end = scan_identifier(bytes, pos);
                    let ident = &value[pos..end];

                    let is_keyword = CONDITION_KEYWORDS
                        .binary_search(&ident.to_ascii_uppercase().as_str())
                        .is_ok();

                    if is_keyword || self.is_exempt(ident) {
                        out.push_str(ident);
                    } else {
                        out.push_str(&self.suffix(ident));
                    }

                    pos = end;
                }

                // component and feature state sigils (`$ ? & !`) and
                //   operators are copied through verbatim
                _ => {
                    let end = memchr2(b'"', b'%', &bytes[pos + 1..])
                        .map(|i| pos + 1 + i)
                        .unwrap_or(bytes.len());

                    let end = bytes[pos + 1..end]
                        .iter()
                        .position(|b| b.is_ascii_alphanumeric() || *b == b'_')
                        .map(|i| pos + 1 + i)
                        .unwrap_or(end);

                    out.push_str(&value[pos..end]);
                    pos = end;
                }
            }
        }

        Ok(Cow::Owned(out))
    }
}

/// Index one past the end of the identifier beginning at `start`.
fn scan_identifier(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_' || *b == b'.'))
        .map(|i| start + i)
        .unwrap_or(bytes.len())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::TableDefinitionCollection;
    use ColumnModularizeType as Mt;

    const GUID: &str = "ABCD1234";

    struct Sut {
        ignored: FxHashSet<String>,
        actions: FxHashSet<String>,
    }

    impl Sut {
        fn new() -> Self {
            Self {
                ignored: ["KEEPME".to_string()].into_iter().collect(),
                actions: ["InstallFinalize".to_string()].into_iter().collect(),
            }
        }

        fn modularizer(&self) -> Modularizer<'_> {
            Modularizer::new(GUID, &self.ignored, &self.actions)
        }

        fn rewrite(&self, ty: Mt, value: &str) -> String {
            self.modularizer().value(ty, value).unwrap().into_owned()
        }
    }

    #[test]
    fn column_appends_guid() {
        let sut = Sut::new();

        assert_eq!("CompX.ABCD1234", sut.rewrite(Mt::Column, "CompX"));
        assert_eq!("KEEPME", sut.rewrite(Mt::Column, "KEEPME"));
        assert_eq!("TARGETDIR", sut.rewrite(Mt::Column, "TARGETDIR"));
        assert_eq!("InstallFinalize", sut.rewrite(Mt::Column, "InstallFinalize"));
        assert_eq!("", sut.rewrite(Mt::Column, ""));
    }

    #[test]
    fn column_leaves_non_identifiers() {
        let sut = Sut::new();

        assert_eq!("[ProductName]", sut.rewrite(Mt::Column, "[ProductName]"));
        assert_eq!("two words", sut.rewrite(Mt::Column, "two words"));
        assert_eq!("C:\\x", sut.rewrite(Mt::Column, "C:\\x"));
        assert_eq!("1stRow", sut.rewrite(Mt::Column, "1stRow"));
        assert_eq!(
            "A.ABCD1234;a b;B.ABCD1234",
            sut.rewrite(Mt::SemicolonDelimited, "A;a b;B")
        );
    }

    #[test]
    fn property_rewrites_bracketed_identifiers_only() {
        let sut = Sut::new();

        assert_eq!(
            "[INSTALLDIR.ABCD1234]\\foo.exe",
            sut.rewrite(Mt::Property, "[INSTALLDIR]\\foo.exe")
        );
        assert_eq!(
            "[#File.ABCD1234] [!Short.ABCD1234] [$Comp.ABCD1234]",
            sut.rewrite(Mt::Property, "[#File] [!Short] [$Comp]")
        );
        assert_eq!(
            "[%PATH] [\\[] [~] [ProductName]",
            sut.rewrite(Mt::Property, "[%PATH] [\\[] [~] [ProductName]")
        );
        assert_eq!("[[INNER.ABCD1234]]", sut.rewrite(Mt::Property, "[[INNER]]"));
        assert_eq!("[UNCLOSED", sut.rewrite(Mt::Property, "[UNCLOSED"));
    }

    #[test]
    fn condition_rewrites_bare_identifiers() {
        let sut = Sut::new();

        assert_eq!(
            "MYPROP.ABCD1234 AND NOT Installed",
            sut.rewrite(Mt::Condition, "MYPROP AND NOT Installed")
        );
        assert_eq!(
            "$Comp.ABCD1234=3 or &Feat.ABCD1234>2",
            sut.rewrite(Mt::Condition, "$Comp=3 or &Feat>2")
        );
        assert_eq!(
            "%PATH<>\"x\" AND VersionNT>=500",
            sut.rewrite(Mt::Condition, "%PATH<>\"x\" AND VersionNT>=500")
        );
        assert_eq!(
            "A.ABCD1234=\"B C\"",
            sut.rewrite(Mt::Condition, "A=\"B C\"")
        );
    }

    // Values lacking identifiers are unchanged.
    #[test]
    fn non_identifiers_are_unchanged() {
        let sut = Sut::new();

        for value in ["\"just a string\"", "42", "1 = 1", "\"a\" <> \"b\""] {
            assert_eq!(value, sut.rewrite(Mt::Condition, value));
        }

        for value in ["plain text", "C:\\dir\\file.txt", "123"] {
            assert_eq!(value, sut.rewrite(Mt::Property, value));
        }
    }

    #[test]
    fn unterminated_condition_string_is_reported() {
        let sut = Sut::new();

        assert_eq!(
            Err(ModularizeError::UnterminatedString("A=\"oops".into())),
            sut.modularizer().value(Mt::Condition, "A=\"oops")
        );
    }

    #[test]
    fn icon_guid_precedes_extension() {
        let sut = Sut::new();

        assert_eq!("app.ABCD1234.ico", sut.rewrite(Mt::Icon, "app.ico"));
        assert_eq!("app.v2.ABCD1234.exe", sut.rewrite(Mt::Icon, "app.v2.exe"));
        assert_eq!("noext.ABCD1234", sut.rewrite(Mt::Icon, "noext"));
    }

    #[test]
    fn companion_file_skips_versions() {
        let sut = Sut::new();

        assert_eq!("1.0.0.0", sut.rewrite(Mt::CompanionFile, "1.0.0.0"));
        assert_eq!("Other.ABCD1234", sut.rewrite(Mt::CompanionFile, "Other"));
    }

    #[test]
    fn semicolon_delimited_rewrites_each_token() {
        let sut = Sut::new();

        assert_eq!(
            "A.ABCD1234;KEEPME;B.ABCD1234",
            sut.rewrite(Mt::SemicolonDelimited, "A;KEEPME;B")
        );
    }

    #[test]
    fn control_event_argument_depends_on_event() {
        let sut = Sut::new();
        let m = sut.modularizer();

        assert_eq!("Dlg.ABCD1234", m.control_event_argument("NewDialog", "Dlg"));
        assert_eq!("Return", m.control_event_argument("EndDialog", "Return"));
        assert_eq!(
            "[P.ABCD1234]",
            m.control_event_argument("[SETME]", "[P]")
        );
    }

    #[test]
    fn row_text_uses_event_of_row() {
        let sut = Sut::new();
        let defs = TableDefinitionCollection::builtin().unwrap();

        let mut row = Row::new(defs.get("ControlEvent").unwrap().clone(), 0);
        row.set(0, Some("Dlg".into())).unwrap();
        row.set(1, Some("Next".into())).unwrap();
        row.set(2, Some("DoAction".into())).unwrap();
        row.set(3, Some("MyCa".into())).unwrap();
        row.set(4, Some("1".into())).unwrap();
        row.set(5, Some(crate::row::FieldData::Number(3))).unwrap();

        assert_eq!(
            vec![
                Some("Dlg.ABCD1234".to_string()),
                Some("Next".to_string()),
                Some("DoAction".to_string()),
                Some("MyCa.ABCD1234".to_string()),
                Some("1".to_string()),
                Some("3".to_string()),
            ],
            sut.modularizer().row_text(&row).unwrap()
        );
    }
}
