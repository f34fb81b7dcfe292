// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Alignment by constant.
//!
//! `#[repr(align)]` only takes an integer literal, so a buffer that must be aligned to a value
//! named by a constant (such as the inline storage holding a thread's closure) can't use it
//! directly.  [`AlignAs<N>`] maps `N` to a zero sized type with that alignment; placed as the
//! first field of a `#[repr(C)]` struct, it aligns the fields that follow.

#[doc(hidden)]
pub struct AlignAsStruct;

#[doc(hidden)]
pub trait AlignAsTrait<const N: usize> {
    type Aligned;
}

macro_rules! impl_alignas {
    ( $($align:literal),* $(,)? ) => {
        $(
            const _: () = {
                #[repr(align($align))]
                pub struct Aligned;
                impl AlignAsTrait<$align> for AlignAsStruct {
                    type Aligned = Aligned;
                }
            };
        )*
    };
}
impl_alignas!(1, 2, 4, 8, 16, 32, 64);

/// A zero sized marker aligned to `N` bytes.
#[repr(transparent)]
pub struct AlignAs<const N: usize>([<AlignAsStruct as AlignAsTrait<N>>::Aligned; 0])
where
    AlignAsStruct: AlignAsTrait<N>;

impl<const N: usize> AlignAs<N>
where
    AlignAsStruct: AlignAsTrait<N>,
{
    /// The marker value.
    pub const fn new() -> AlignAs<N> {
        AlignAs([])
    }
}

impl<const N: usize> Default for AlignAs<N>
where
    AlignAsStruct: AlignAsTrait<N>,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::AlignAs;
    use core::mem::{align_of, size_of};

    #[repr(C)]
    struct Buffer {
        _align: AlignAs<16>,
        bytes: [u8; 3],
    }

    #[test]
    fn aligns_following_fields() {
        assert_eq!(size_of::<AlignAs<64>>(), 0);
        assert_eq!(align_of::<Buffer>(), 16);
        assert_eq!(size_of::<Buffer>(), 16);
        let buf = Buffer { _align: AlignAs::new(), bytes: [0; 3] };
        assert_eq!(buf.bytes.as_ptr() as usize % 16, 0);
    }
}
