//! Signature table: every compiled Packet keyed by header, plus build metadata, ready for JSON.
//!
//! ```text
//! {
//!   "6F": { "desc": "Hero Effect",
//!           "signature": { "$4 [REPS] $4 $1 [REPE]": { "params": [ { "name": "HeroID" }, ... ] } } },
//!   "_timestamp": 1700000000000,
//!   "_builder": ["sigbuilder", "build 0.1.0", "5"]
//! }
//! ```

use crate::ast::SignatureSet;
use crate::compile::Context;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Revision of the output layout understood by the packet parser.
pub const FORMAT_REVISION: &str = "5";

#[derive(Debug, Clone, Serialize)]
pub struct PacketEntry {
    pub desc: String,
    pub signature: SignatureSet,
}

#[derive(Debug, Clone)]
pub struct SignatureTable {
    pub packets: IndexMap<String, PacketEntry>,
    /// Unix milliseconds at assembly time.
    pub timestamp: i64,
    pub builder: [String; 3],
}

impl SignatureTable {
    /// Collect every compiled Packet in registration order. Packets that were never compiled
    /// are skipped.
    pub fn assemble(ctx: &Context) -> Self {
        let packets = ctx
            .registry
            .packets()
            .filter_map(|p| {
                p.signatures.as_ref().map(|set| {
                    (
                        p.header.clone(),
                        PacketEntry {
                            desc: p.description.clone(),
                            signature: set.clone(),
                        },
                    )
                })
            })
            .collect();
        SignatureTable {
            packets,
            timestamp: chrono::Utc::now().timestamp_millis(),
            builder: [
                env!("CARGO_PKG_NAME").to_string(),
                format!("build {}", env!("CARGO_PKG_VERSION")),
                FORMAT_REVISION.to_string(),
            ],
        }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

impl Serialize for SignatureTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.packets.len() + 2))?;
        for (header, entry) in &self.packets {
            map.serialize_entry(header, entry)?;
        }
        map.serialize_entry("_timestamp", &self.timestamp)?;
        map.serialize_entry("_builder", &self.builder)?;
        map.end()
    }
}
