//! `sentra`: a sentence-granular distributed file service.
//!
//! Two coordinating roles share this crate: the name server ([`ns`]) owns
//! the namespace, ACL and routing; the storage server ([`ss`]) owns file
//! bytes, sentence locks, undo and checkpoints. Both speak the same
//! length-prefixed control-record protocol defined in [`wire`].

pub mod client;
pub mod config;
pub mod error;
pub mod ns;
pub mod ss;
pub mod wire;
