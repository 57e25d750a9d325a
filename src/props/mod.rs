//! Function props and the field-by-field merger
//!
//! Every layer of the defaults cascade contributes a partial [`FunctionProps`].
//! The layers are combined with [`merge_props`]:
//!
//! ```text
//! app defaults ⊕ unit defaults ⊕ resource defaults ⊕ inline props
//! ```
//!
//! Each field declares its merge policy at compile time through
//! `#[derive(MergeProps)]`:
//!
//! | strategy      | rule                                                    |
//! |---------------|---------------------------------------------------------|
//! | `scalar`      | override wins if set, else base                         |
//! | `union`       | shallow key union, override wins per key                |
//! | `permissions` | wildcard absorbs, otherwise base then override appended |
//! | `replace`     | override replaces base wholesale (no deep merge)        |
//! | `concat`      | base then override appended                             |

pub mod function;
pub mod merge;

pub use function::{Architecture, Bundle, BundleOptions, FunctionProps, LayerRef, Runtime};

/// A partial configuration that can be layered on top of another one.
///
/// Implementations are generated by `#[derive(MergeProps)]`; merging is pure
/// and total.
pub trait MergeProps: Sized {
    /// Merge `other` on top of `self`
    fn merge(&self, other: &Self) -> Self;
}

/// Merge `override_props` on top of `base`
pub fn merge_props<T: MergeProps>(base: &T, override_props: &T) -> T {
    base.merge(override_props)
}

/// Left fold of [`merge_props`] over any number of partials
pub fn merge_all<'a, T>(partials: impl IntoIterator<Item = &'a T>) -> T
where
    T: MergeProps + Default + 'a,
{
    partials
        .into_iter()
        .fold(T::default(), |acc, next| acc.merge(next))
}
