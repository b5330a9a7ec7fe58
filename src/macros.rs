#![allow(unused_macros)]

/// Declares a copyable `u32`-backed handle into one of the IR arenas.
///
/// ```rust, ignore
///  entity_id!(InstId, "%v", "Handle of an instruction");
///  let id = InstId::new(3);
///  assert_eq!(id.to_string(), "%v3");
/// ```
macro_rules! entity_id {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Creates a handle from a raw arena index.
            ///
            /// # Panics
            ///
            /// Panics if `index` does not fit in 32 bits.
            #[must_use]
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(u32::try_from(index).expect("arena index exceeds u32"))
            }

            /// Returns the raw arena index.
            #[must_use]
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}
