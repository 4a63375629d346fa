//! IBC topology and denomination resolution
//!
//! Two resolvers over the query client:
//!
//! - [`TopologyResolver`] walks channel → connection → client state on the
//!   queried chain to identify the counterparty chain of a channel, with no
//!   registry channel-pair file involved;
//! - [`DenomResolver`] recursively unwraps an `ibc/<hash>` token to its
//!   base denom and origin chain, peeling one `port/channel` pair per hop
//!   and re-hashing the remaining path, cycle- and depth-bounded.

mod denom;
mod topology;

pub use denom::{DenomResolver, MAX_HOPS};
pub use topology::{CounterpartyInfo, TopologyError, TopologyResolver};
