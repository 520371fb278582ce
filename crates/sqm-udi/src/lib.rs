//! The universal data index (UDI): the sole in-memory owner of the
//! aggregator's channel/stream/group/logo/provider/profile catalog, with a
//! persisted JSON mirror and a short-TTL live-status cache for "is this
//! channel/profile currently being watched" questions.
//!
//! Every other component reads this catalog, and writes it only through
//! [`Udi::update_channel`]/[`Udi::update_stream`] after performing the
//! corresponding aggregator PATCH — UDI never originates a write of its
//! own besides refresh and those two mirrors.

pub mod error;
pub mod index;
pub mod proxy;
pub mod snapshot;
pub mod transform;

pub use error::{Result, UdiError};
pub use index::Udi;
pub use transform::apply_url_transformation;
