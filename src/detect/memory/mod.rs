//! Memory-poisoning detectors.
//!
//! Six detectors scan the conversation history and the persistent memory
//! log for signs that an attacker has planted instructions, encoded
//! payloads, or goal-shifting content.  All of them emit findings in
//! [`Category::MemoryPoisoning`](crate::finding::Category::MemoryPoisoning).

pub mod drift;
pub mod encoded;
pub mod entropy;
pub mod persistence;
pub mod recursive;
pub mod signatures;
