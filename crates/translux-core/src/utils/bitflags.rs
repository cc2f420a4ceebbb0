// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A macro declaring a typed flag set over an unsigned integer.

/// Declares a `Copy` flag-set struct with named constants and the usual
/// set operators (`|`, `&`, `contains`, `intersects`).
#[macro_export]
#[doc(hidden)]
macro_rules! translux_flags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// The empty set.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Builds a set from raw bits, keeping unknown bits as-is.
            pub const fn from_bits_retain(bits: $ty) -> Self {
                Self { bits }
            }

            /// Raw bit value.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// `true` when every flag of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// `true` when `self` and `other` share at least one flag.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// `true` when no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self { bits: self.bits | rhs.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.bits |= rhs.bits;
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self { bits: self.bits & rhs.bits }
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut rest = self.bits;
                let mut first = true;
                write!(f, "{}(", stringify!($name))?;
                $(
                    if $flag_value != 0 && (rest & $flag_value) == $flag_value {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", stringify!($flag_name))?;
                        rest &= !$flag_value;
                        first = false;
                    }
                )*
                if rest != 0 {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, "{:#x}", rest)?;
                } else if first {
                    write!(f, "EMPTY")?;
                }
                write!(f, ")")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::translux_flags;

    translux_flags! {
        /// Flags used only by these tests.
        pub struct Access: u8 {
            const READ = 1 << 0;
            const WRITE = 1 << 1;
            const EXEC = 1 << 2;
        }
    }

    #[test]
    fn test_contains_and_intersects() {
        let rw = Access::READ | Access::WRITE;
        assert!(rw.contains(Access::READ));
        assert!(!rw.contains(Access::EXEC));
        assert!(rw.intersects(Access::WRITE | Access::EXEC));
        assert!(!Access::EXEC.intersects(rw));
        assert!(Access::EMPTY.is_empty());
    }

    #[test]
    fn test_debug_lists_named_flags() {
        assert_eq!(format!("{:?}", Access::READ | Access::EXEC), "Access(READ | EXEC)");
        assert_eq!(format!("{:?}", Access::EMPTY), "Access(EMPTY)");
        assert_eq!(
            format!("{:?}", Access::from_bits_retain(0b1001)),
            "Access(READ | 0x8)"
        );
    }
}
