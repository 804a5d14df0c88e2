//! tinytpc-io: text tables in, CSV results out.
//!
//! - pedestal tables: 21 rows of 21 baselines
//! - packet tables: decoded packets as CSV, read through a memory map
//! - result writers: candidate summaries, dE/dx samples and pedestal statistics
//!

mod error;
mod packet_table;
mod pedestal_table;
mod writer;

pub use error::{Error, Result};
pub use packet_table::{
    parse_packet_table, read_packet_table, save_packet_table, write_packet_table,
    PacketTableReader, PACKET_TABLE_HEADER,
};
pub use pedestal_table::{
    parse_pedestal_table, read_pedestal_table, save_pedestal_table, write_pedestal_table,
};
pub use writer::{ResultWriter, CANDIDATE_HEADER, DEDX_HEADER};
