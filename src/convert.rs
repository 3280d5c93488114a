// Canonical string conversions
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

//! Conversion between enums and their canonical string forms.
//!
//! Schema attributes,
//!   object file attributes,
//!   and the standard action table all represent enumerated values as
//!   strings.
//! Each such enum is declared using [`str_enum!`],
//!   which generates from a single table both directions of the mapping:
//!
//!   - [`as_str`](#) and [`Display`](std::fmt::Display); and
//!   - [`FromStr`](std::str::FromStr),
//!       failing with [`UnknownVariant`] for anything not in the table.
//!
//! Having a single table means that the two directions cannot drift
//!   apart,
//!     and the generated `ALL` constant allows round-trip tests to cover
//!     every variant.
//!
//! ```
//! use wixer::str_enum;
//!
//! str_enum! {
//!     pub enum Fruit {
//!         Apple => "apple",
//!         Pear => "pear",
//!     }
//! }
//!
//! assert_eq!("pear", Fruit::Pear.as_str());
//! assert_eq!(Ok(Fruit::Apple), "apple".parse());
//! assert!("kiwi".parse::<Fruit>().is_err());
//! assert_eq!(2, Fruit::ALL.len());
//! ```

use std::error::Error;
use std::fmt::{self, Display};

/// Declare an enum together with its canonical string table.
///
/// See the [module-level documentation](self) for more information.
#[macro_export]
macro_rules! str_enum {
    (
        $(#[$attr:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vattr:meta])*
                $variant:ident => $str:literal,
            )+
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $(
                $(#[$vattr])*
                $variant,
            )+
        }

        impl $name {
            /// Every variant,
            ///   in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Canonical string form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)+
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::convert::UnknownVariant;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s {
                    $($str => Ok($name::$variant),)+
                    _ => Err($crate::convert::UnknownVariant::new(
                        stringify!($name),
                        s,
                    )),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// A string did not name any variant of the enum `ty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    ty: &'static str,
    value: String,
}

impl UnknownVariant {
    pub fn new<S: Into<String>>(ty: &'static str, value: S) -> Self {
        Self {
            ty,
            value: value.into(),
        }
    }

    pub fn ty(&self) -> &'static str {
        self.ty
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} `{}`", self.ty, self.value)
    }
}

impl Error for UnknownVariant {}

#[cfg(test)]
mod test {
    str_enum! {
        enum Stub {
            First => "first",
            SecondThing => "secondThing",
        }
    }

    #[test]
    fn round_trips_every_variant() {
        for v in Stub::ALL {
            assert_eq!(Ok(*v), v.as_str().parse::<Stub>());
            assert_eq!(v.as_str(), v.to_string());
        }
    }

    #[test]
    fn matching_is_case_sensitive() {
        let err = "secondthing".parse::<Stub>().unwrap_err();

        assert_eq!("Stub", err.ty());
        assert_eq!("unknown Stub `secondthing`", err.to_string());
    }
}
