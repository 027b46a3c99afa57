//! Standard library.

// # Tries to deny all lints (`rustc -W help`).
#![deny(absolute_paths_not_starting_with_crate)]
#![deny(anonymous_parameters)]
#![deny(deprecated_in_future)]
#![deny(explicit_outlives_requirements)]
#![deny(keyword_idents)]
#![deny(macro_use_extern_crate)]
#![deny(missing_debug_implementations)]
#![deny(non_ascii_idents)]
#![deny(rust_2018_idioms)]
#![deny(trivial_numeric_casts)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_extern_crates)]
#![deny(unused_import_braces)]
#![deny(unused_qualifications)]
//
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_html_tags)]
#![deny(rustdoc::invalid_rust_codeblocks)]
#![deny(rustdoc::bare_urls)]
//
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::type_complexity)]
#![allow(elided_lifetimes_in_paths)]

use thiserror::Error;

pub mod counter;
pub mod credit;
pub mod fifo;
pub mod rr_mux;
pub mod sync;

pub use counter::*;
pub use credit::*;
pub use fifo::*;
pub use rr_mux::*;
pub use sync::*;

/// Violation of a flow-control protocol.
///
/// A correct system never raises one, so it is never returned: components panic with it instead, since continuing
/// would corrupt all subsequent traffic.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("credit returned beyond the capacity of {capacity}")]
    CreditOverflow { capacity: usize },
    #[error("credit consumed while none is available")]
    CreditUnderflow,
    #[error("receive buffer of {capacity} slots overflowed despite credit gating")]
    BufferOverflow { capacity: usize },
    #[error("clock-domain crossing FIFO of {capacity} slots overflowed")]
    CrossingOverflow { capacity: usize },
    #[error("frame pending on the link while the bridge is gated")]
    FrameWhileGated,
}
