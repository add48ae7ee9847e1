//! # Alias Mapper Shared
//!
//! Plain data types exchanged between the alias mapper crates: entities and
//! their aliases, the disjunctive queries built from them, the hits returned by
//! the search cluster and the mapping rows persisted to the relational store.

mod entity;
mod hit;
mod ids;
mod mapping;
mod query;

pub use entity::{AliasBatch, Entity};
pub use hit::{Hit, HitPage, ScrollState};
pub use ids::{EntityId, GroupId, RecordId};
pub use mapping::{GroupCheckpoint, MappingRow};
pub use query::{ClauseQuery, Corpus};
