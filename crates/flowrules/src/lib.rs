//! OpenFlow rule compilation for ring fast-failover forwarding.
//!
//! This crate turns forwarding intents into the table commands a switch
//! understands, and keeps a software mirror of the resulting tables.
//!
//! # Example
//!
//! ```
//! use flowrules::{compiler, types::Match, Action, SwitchTables, MAIN_TABLE};
//!
//! let mut tables = SwitchTables::new();
//! tables.apply(&compiler::table_miss());
//! tables.apply(&compiler::build_failover_group(2, 1, 51));
//! tables.apply(&compiler::install_flow(
//!     MAIN_TABLE,
//!     1,
//!     Match::any().in_port(1).ipv4_dst("10.0.2.2".parse().unwrap()),
//!     vec![Action::group(51)],
//! ));
//!
//! assert_eq!(tables.flow_count(), 2);
//! assert!(tables.overlapping_entries().is_empty());
//! ```

pub mod commands;
pub mod compiler;
pub mod table;
pub mod types;

pub use commands::{Command, PacketOut};
pub use table::SwitchTables;
pub use types::{
    Action, Bucket, FlowEntry, FlowKey, GroupEntry, GroupType, MacAddress, MAIN_TABLE, Match,
    NO_BUFFER, PacketFields, PortConfig, PortDescriptor, PortState, SwitchId, ether_type, port_no,
};
