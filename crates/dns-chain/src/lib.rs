//! Chain-facing side of zone synchronisation
//!
//! Decodes zone hash change logs, resolves content hashes through a gateway,
//! and attests event origins against the naming registry.

pub mod contenthash;
pub mod event;
pub mod gateway;
pub mod multiaddr;
pub mod registry;

pub use contenthash::contenthash_to_string;
pub use event::{ChangeEvent, EventDecoder, LogRecord, ZoneAction, ZONEHASH_CHANGED_TOPIC};
pub use gateway::ContentResolver;
pub use multiaddr::{ContentAddress, P_P2P};
pub use registry::{
    JsonRpcRegistry, OriginAttestation, OriginAttestor, ResolverRegistry, ENS_REGISTRY_ADDRESS,
    RESOLVER_SELECTOR,
};
