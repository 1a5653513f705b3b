//! # sigbuilder: Packet Signature Compiler
//!
//! Compiles a line-oriented DSL describing packet layouts into a byte-signature table: for
//! every packet header, a map from a token pattern (hex bytes, size placeholders, repeat
//! markers) to the ordered list of fields that pattern decodes.
//!
//! ## DSL structure
//!
//! - **Fragments**: named, reusable token/field sequences (`Fragment[Name]`)
//! - **Packets**: keyed by hex header (`Packet[Description]:6F`), compiled to one or more
//!   signatures
//! - **Sub-categories**: one `+ SubCate` placeholder per packet, expanded once per
//!   `SubCate[desc:HEX]` branch
//! - **Repeatable groups**: `+ REP` ... `- REP`
//!
//! ## Field lines
//!
//! `name:token[:annotation...]` where token is `$1`, `$2`, `$4`, hex bytes, `64$4`,
//! `73$4$gbk`, `$gbk` or `param`, and annotations are `R[db,...]`, `Fn[name,...]`,
//! `T[byte|short|ushort|int|uint]` and `P[@alias]`. `pad-N` inserts N zero bytes.
//!
//! ## Example DSL
//!
//! ```text
//! <parser>
//! Fragment[Pos]
//! X:$2
//! Y:$2
//!
//! Packet[Move]:0A
//! ActorID:$4:R[npc]
//! + Fragment[Pos]
//! + SubCate
//! pack
//! SubCate[Walk:01]
//! Speed:$1
//! SubCate[Run:02]
//! Speed:$2:T[ushort]
//! </parser>
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut ctx = sigbuilder::Context::new();
//! sigbuilder::ingest::load(&source, &mut ctx)?;
//! ctx.compile_all()?;
//! let json = sigbuilder::SignatureTable::assemble(&ctx).to_json(false)?;
//! ```

pub mod ast;
pub mod compile;
pub mod diag;
pub mod error;
pub mod fragment;
pub mod ingest;
pub mod packet;
pub mod parser;
pub mod registry;
pub mod table;

pub use ast::{FieldDescriptor, ForcedType, Signature, SignatureEntry, SignatureSet, Token};
pub use compile::Context;
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use error::{CompileError, ErrorKind};
pub use registry::{CompiledFragment, DeclRef, Registry};
pub use table::SignatureTable;

/// Ingest `source`, compile everything, and assemble the table.
pub fn build(source: &str, ctx: &mut Context) -> Result<SignatureTable, CompileError> {
    ingest::load(source, ctx)?;
    ctx.compile_all()?;
    Ok(SignatureTable::assemble(ctx))
}
