//! Genealogical domain model.
//!
//! # Responsibility
//! - Define the in-memory record graph shared by parsing, analysis,
//!   export and import.
//! - Keep relationships as id values so the graph has no ownership cycles.
//!
//! # Invariants
//! - The `Graph` owns every record; engines only borrow it.
//! - Dates keep their original text next to the normalized form.

pub mod date;
pub mod graph;
pub mod relations;

pub use date::{DatePrecision, GenDate, RangeStyle};
pub use graph::{
    format_gedcom_name, split_gedcom_name, Association, Citation, Event, EventKind, EventOwner,
    Family, FamilyLink, Graph, HeaderInfo, Individual, ParentLink, Pedigree, RecordId, Sex, Source,
};
pub use relations::{
    assign_roles, attach_partner_events, plan_families, synthesize_families, FamilyPlan,
    PartnerRoles,
};
