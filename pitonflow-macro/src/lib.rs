//! Implementation of `#[derive(Signal)]`.
//!
//! # Note
//!
//! A derived struct is laid out field by field, the first field occupying the least significant bits. For example,
//! the link frame of the chipset bridge is:
//!
//! ```ignore
//! #[derive(Debug, Clone, PartialEq, Eq, Signal)]
//! pub struct LinkFrame<V: Signal, const N: usize> {
//!     data: Valid<V>,
//!     channel: Bits<2>,
//!     credit_back: [bool; N],
//!     check: Bits<8>,
//! }
//! ```
//!
//! whose `WIDTH` is `<Valid<V>>::WIDTH + 2 + N + 8`.
//!
//! Unit enums are encoded by variant index unless `#[encode(..)]` says otherwise, in `clog2(#variants)` bits unless
//! `#[width(..)]` says otherwise.

mod signal;
mod utils;

use proc_macro::{self, TokenStream};

#[proc_macro_derive(Signal, attributes(width, encode))]
pub fn signal(input: TokenStream) -> TokenStream { signal::derive(input) }
