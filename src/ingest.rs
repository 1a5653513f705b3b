//! Ingestion: split raw DSL text into Fragment and Packet declarations and register them.
//!
//! Only text between `<parser>` and `</parser>` is read. `/// ` prefixes are removed so the
//! DSL can live inside doc comments of another file. `//` starts a comment.

use crate::compile::Context;
use crate::error::{CompileError, ErrorKind, Result};
use crate::parser::{parse_fragment_header, parse_packet_header};
use crate::registry::DeclRef;

/// Strip doc prefixes and comments. `None` for lines with no code.
pub fn sanitize(raw: &str) -> Option<&str> {
    let line = raw.trim();
    let line = line.strip_prefix("/// ").unwrap_or(line).trim();
    if line.is_empty() || line.starts_with("//") {
        return None;
    }
    let code = match line.find("//") {
        Some(i) => line[..i].trim(),
        None => line,
    };
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Register every declaration in `source` (1-based line numbers) into `ctx`.
///
/// A fatal error is recorded in the diagnostics and returned.
pub fn load(source: &str, ctx: &mut Context) -> Result<()> {
    let result = load_inner(source, ctx);
    if let Err(e) = &result {
        ctx.diagnostics.fatal(e);
    }
    result
}

fn load_inner(source: &str, ctx: &mut Context) -> Result<()> {
    let mut in_parser = false;
    let mut current: Option<DeclRef> = None;

    for (i, raw) in source.lines().enumerate() {
        let num = i + 1;
        let line = match sanitize(raw) {
            Some(l) => l,
            None => continue,
        };

        match line {
            "<parser>" => {
                in_parser = true;
                continue;
            }
            "</parser>" => {
                in_parser = false;
                current = None;
                continue;
            }
            _ => {}
        }
        if !in_parser {
            return Err(CompileError::new(ErrorKind::OutsideParserSection, num, line));
        }

        if line.starts_with("Fragment[") {
            let name = parse_fragment_header(line)
                .ok_or_else(|| CompileError::new(ErrorKind::MalformedFragmentHeader, num, line))?;
            current = Some(ctx.register_fragment(&name, num, line)?);
        } else if line.starts_with("Packet[") {
            let (desc, header) = parse_packet_header(line)
                .ok_or_else(|| CompileError::new(ErrorKind::MalformedPacketHeader, num, line))?;
            current = Some(ctx.register_packet(&desc, &header, num, line)?);
        } else {
            let decl = current
                .as_ref()
                .ok_or_else(|| CompileError::new(ErrorKind::NoCurrentDeclaration, num, line))?;
            ctx.add_line(decl, num, line)?;
        }
    }
    Ok(())
}
