//! Circuit definitions for the two recursive stages (spec §4.3, §4.4). The
//! inner (application) circuit is an external collaborator's concern and is
//! deliberately absent here.

pub mod aggregator;
pub mod wrapper;
