/// A trait for representing compact, copyable handles (IDs) for nodes stored
/// in a [Pool](crate::pool::Pool).
///
/// Both trees of this crate are flattened into pools, so every parent/child
/// link is a handle rather than a pointer.
///
/// Inspired by:
/// - [Flattening ASTs (and Other Compiler Data Structures)](https://www.cs.cornell.edu/~asampson/blog/flattening.html)
/// - [Handles are the better pointers](https://floooh.github.io/2018/06/17/handles-vs-pointers.html)
pub trait Handle: Copy + Ord {
    /// Compile-time reflection so handle `Debug` output can be nice.
    const NAME: &'static str;
    fn from_usize(n: usize) -> Self;
    fn to_usize(self) -> usize;
}

/// Raw indices; the typed handles below wrap one of these.
impl Handle for u32 {
    const NAME: &'static str = "u32";

    #[inline]
    fn from_usize(idx: usize) -> Self {
        // Trees never come close to 2^32 nodes.
        idx as u32
    }

    #[inline]
    fn to_usize(self) -> usize {
        self as usize
    }
}

macro_rules! impl_handle {
    (
        $(
            $(#[$attr:meta])*
            $vis:vis struct $name:ident($type:ty);
        )*
    ) => {
        $(
            $(#[$attr])*
            #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
            $vis struct $name($type);

            impl $crate::handle::Handle for $name {
                const NAME: &'static str = stringify!($name);

                #[inline(always)]
                fn from_usize(n: usize) -> $name {
                    $name($crate::handle::Handle::from_usize(n))
                }

                #[inline(always)]
                fn to_usize(self) -> usize {
                    $crate::handle::Handle::to_usize(self.0)
                }
            }

            impl ::std::fmt::Debug for $name {
                fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                    write!(f, "{}#{}", <$name as $crate::handle::Handle>::NAME, self.0)
                }
            }
        )*
    };
}

pub(crate) use impl_handle;
