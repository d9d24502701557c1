//! A `const`-context substitute for `Default`.
//!
//! Kernel state lives in `static` arenas, which must be initialized with a
//! `const` expression. `Default::default()` is not `const fn`, so every
//! statically-allocated kernel type implements this trait instead.

/// Types with a `const` default value, usable to initialize a `static`.
pub trait Init {
    const INIT: Self;
}

macro_rules! impl_init_with_default {
    ($($ty:ty => $val:expr,)*) => {
        $(
            impl Init for $ty {
                const INIT: Self = $val;
            }
        )*
    };
}

impl_init_with_default! {
    bool => false,
    u8 => 0, u16 => 0, u32 => 0, u64 => 0, u128 => 0, usize => 0,
    i8 => 0, i16 => 0, i32 => 0, i64 => 0, i128 => 0, isize => 0,
}

impl<T> Init for Option<T> {
    const INIT: Self = None;
}

impl<T: Init, const N: usize> Init for [T; N] {
    const INIT: Self = [T::INIT; N];
}
