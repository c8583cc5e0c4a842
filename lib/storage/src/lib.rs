//! Artifact persistence
//!
//! Trained bundles and embedding indexes are bincode-encoded and written
//! atomically (tmp file + rename), so a crash mid-save never leaves a torn
//! artifact behind. Loads re-validate everything a writer could have gotten
//! wrong.

pub mod index_store;
pub mod model_store;

pub use index_store::IndexStore;
pub use model_store::ModelStore;
