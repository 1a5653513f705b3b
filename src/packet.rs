//! Packet compiler: a single pass over a Packet's body lines that assembles its signature set.
//!
//! The main body accumulates tokens (with a `{SUBCATE}` token at the placeholder) and two
//! field lists, split at the placeholder. Each `SubCate[...]` opens a branch with its own
//! tokens and fields. On finish every committed branch becomes one entry:
//! `main[{SUBCATE} := branch]` with fields `before ++ branch ++ after`.

use crate::ast::{FieldDescriptor, Signature, SignatureEntry, SignatureSet, Token};
use crate::compile::Context;
use crate::diag::Diagnostics;
use crate::error::{CompileError, ErrorKind, Result};
use crate::parser::{parse_body_line, BodyLine, SubcateDecl};
use indexmap::IndexMap;
use log::debug;

#[derive(Debug)]
struct Branch {
    description: String,
    signature: Signature,
    fields: Vec<FieldDescriptor>,
    line: usize,
    raw: String,
}

#[derive(Debug, Default)]
struct PacketBuilder {
    placeholder_seen: bool,
    placeholder_line: usize,
    body_ended: bool,
    /// Position of the pending `+ REP`, if any.
    open_repeat: Option<(usize, String)>,

    main: Signature,
    fields_before: Vec<FieldDescriptor>,
    fields_after: Vec<FieldDescriptor>,

    /// Rendered branch signature → branch, in commit order.
    branches: IndexMap<String, Branch>,
    /// The branch being filled; `Some` means we are inside a sub-category.
    current: Option<Branch>,
    descriptions: Vec<String>,
    discriminators: Vec<String>,
}

impl PacketBuilder {
    fn in_subcate(&self) -> bool {
        self.current.is_some()
    }

    /// Append to whichever accumulator is active: the open branch, or the main body before or
    /// after the placeholder.
    fn push(&mut self, token: Token, field: FieldDescriptor) {
        if let Some(branch) = self.current.as_mut() {
            branch.signature.push(token);
            branch.fields.push(field);
            return;
        }
        self.main.push(token);
        if self.placeholder_seen {
            self.fields_after.push(field);
        } else {
            self.fields_before.push(field);
        }
    }

    fn subcate_placeholder(&mut self, line: usize, raw: &str) -> Result<()> {
        if self.placeholder_seen {
            return Err(CompileError::new(ErrorKind::MultipleSubcatePlaceholders, line, raw));
        }
        if self.body_ended || self.in_subcate() {
            return Err(CompileError::new(ErrorKind::SubcatePlaceholderAfterBody, line, raw));
        }
        self.main.push(Token::SubCategory);
        self.placeholder_seen = true;
        self.placeholder_line = line;
        Ok(())
    }

    fn open_branch(&mut self, decl: SubcateDecl, line: usize, raw: &str, diag: &mut Diagnostics) -> Result<()> {
        if let Some((open_line, open_raw)) = &self.open_repeat {
            return Err(CompileError::new(ErrorKind::UnclosedRepeat, *open_line, open_raw.clone()));
        }
        if let Some(previous) = self.current.take() {
            self.commit(previous, diag)?;
        }

        if !decl.description.is_empty() {
            if self.descriptions.contains(&decl.description) {
                return Err(CompileError::new(
                    ErrorKind::DuplicateSubcateDescription(decl.description),
                    line,
                    raw,
                ));
            }
            self.descriptions.push(decl.description.clone());
        }

        let mut branch = Branch {
            description: decl.description,
            signature: Signature::new(),
            fields: Vec::new(),
            line,
            raw: raw.to_string(),
        };
        if let Some(hex) = decl.discriminator {
            if self.discriminators.iter().any(|d| d.eq_ignore_ascii_case(&hex)) {
                return Err(CompileError::new(ErrorKind::DuplicateSubcateDiscriminator(hex), line, raw));
            }
            self.discriminators.push(hex.clone());
            branch.signature.push(Token::Hex(hex));
            branch.fields.push(FieldDescriptor::subcate_discriminator());
        }

        diag.info(line, format!("New Subcate[{}]", branch.description));
        self.current = Some(branch);
        Ok(())
    }

    /// Add a finished branch to the table; a branch with no signature is dropped with a warning.
    fn commit(&mut self, branch: Branch, diag: &mut Diagnostics) -> Result<()> {
        if branch.signature.is_blank() {
            diag.warn(
                branch.line,
                "Skipped invalid SubCate declaration - No actual signature/body",
                Some(branch.raw.as_str()),
            );
            return Ok(());
        }
        let key = branch.signature.to_string();
        if self.branches.contains_key(&key) {
            return Err(CompileError::new(
                ErrorKind::DuplicateBranchSignature(key),
                branch.line,
                branch.raw,
            ));
        }
        self.branches.insert(key, branch);
        Ok(())
    }

    fn pack(&mut self) -> Result<()> {
        if !self.in_subcate() {
            if let Some((open_line, open_raw)) = &self.open_repeat {
                return Err(CompileError::new(ErrorKind::UnclosedRepeat, *open_line, open_raw.clone()));
            }
        }
        self.body_ended = true;
        Ok(())
    }

    fn repeat_start(&mut self, line: usize, raw: &str) -> Result<()> {
        if self.open_repeat.is_some() {
            return Err(CompileError::new(ErrorKind::NestedRepeat, line, raw));
        }
        if self.body_ended && !self.in_subcate() {
            return Err(CompileError::new(ErrorKind::RepeatOutsideBody, line, raw));
        }
        self.push(Token::RepeatStart, FieldDescriptor::placeholder());
        self.open_repeat = Some((line, raw.to_string()));
        Ok(())
    }

    fn repeat_end(&mut self, line: usize, raw: &str) -> Result<()> {
        if self.open_repeat.is_none() {
            return Err(CompileError::new(ErrorKind::UnopenedRepeat, line, raw));
        }
        if self.body_ended && !self.in_subcate() {
            return Err(CompileError::new(ErrorKind::RepeatOutsideBody, line, raw));
        }
        self.push(Token::RepeatEnd, FieldDescriptor::placeholder());
        self.open_repeat = None;
        Ok(())
    }

    fn finish(mut self, diag: &mut Diagnostics) -> Result<SignatureSet> {
        if let Some((open_line, open_raw)) = self.open_repeat.take() {
            return Err(CompileError::new(ErrorKind::UnclosedRepeat, open_line, open_raw));
        }

        let mut set = SignatureSet::new();
        if !self.placeholder_seen {
            if let Some(branch) = self.current.as_ref() {
                diag.warn(
                    branch.line,
                    "SubCate declared without \"+ SubCate\" placeholder; branches ignored",
                    Some(branch.raw.as_str()),
                );
            }
            set.insert(
                self.main.to_string(),
                SignatureEntry {
                    description: None,
                    params: self.fields_before,
                },
            );
            return Ok(set);
        }

        if let Some(last) = self.current.take() {
            self.commit(last, diag)?;
        }
        if self.branches.is_empty() {
            diag.warn(
                self.placeholder_line,
                "\"+ SubCate\" used but no SubCate branch has a body; no signature emitted",
                None,
            );
        }
        for (_, branch) in self.branches {
            let signature = self.main.expand_subcategory(&branch.signature);
            let mut params =
                Vec::with_capacity(self.fields_before.len() + branch.fields.len() + self.fields_after.len());
            params.extend(self.fields_before.iter().cloned());
            params.extend(branch.fields);
            params.extend(self.fields_after.iter().cloned());
            set.insert(
                signature.to_string(),
                SignatureEntry {
                    description: Some(branch.description),
                    params,
                },
            );
        }
        Ok(set)
    }
}

impl Context {
    /// Compile the Packet registered under `header` (any case). Compiling an already compiled
    /// Packet is a no-op.
    pub fn compile_packet(&mut self, header: &str) -> Result<()> {
        let header = header.to_ascii_uppercase();
        let (lines, description, header_line) = match self.registry.packet(&header) {
            Some(p) if p.is_compiled() => return Ok(()),
            Some(p) => (p.lines.clone(), p.description.clone(), p.line),
            None => {
                return Err(CompileError::new(
                    ErrorKind::UndeclaredPacket(header.clone()),
                    0,
                    header,
                ))
            }
        };

        self.diagnostics.info(
            header_line,
            format!("Building Signature for Packet[{:<4}][{}]", header, description),
        );

        let mut builder = PacketBuilder::default();
        for (num, code) in lines.iter() {
            match parse_body_line(code, num, &mut self.diagnostics)? {
                BodyLine::Field { token, field } => builder.push(token, field),
                BodyLine::FragmentRef(name) => {
                    let fragment = self.compile_fragment(&name, num, code)?;
                    builder.main.extend(&fragment.signature);
                    builder.fields_before.extend(fragment.fields.iter().cloned());
                }
                BodyLine::SubcatePlaceholder => builder.subcate_placeholder(num, code)?,
                BodyLine::Subcate(decl) => builder.open_branch(decl, num, code, &mut self.diagnostics)?,
                BodyLine::Pack => builder.pack()?,
                BodyLine::RepeatStart => builder.repeat_start(num, code)?,
                BodyLine::RepeatEnd => builder.repeat_end(num, code)?,
                BodyLine::Unrecognized => {
                    return Err(CompileError::new(ErrorKind::InvalidCode("Packet"), num, code))
                }
            }
        }

        let set = builder.finish(&mut self.diagnostics)?;
        for key in set.keys() {
            debug!("Packet[{}] => \"{}\"", header, key);
        }
        if let Some(p) = self.registry.packet_mut(&header) {
            p.signatures = Some(set);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(body: &str) -> (Context, Result<()>) {
        let mut ctx = Context::new();
        let d = ctx.register_packet("Test", "6f", 1, "Packet[Test]:6f").unwrap();
        for (i, text) in body.lines().enumerate() {
            ctx.add_line(&d, i + 2, text.trim()).unwrap();
        }
        let r = ctx.compile_packet("6F");
        (ctx, r)
    }

    fn signatures(ctx: &Context) -> &SignatureSet {
        ctx.registry.packet("6F").and_then(|p| p.signatures.as_ref()).expect("compiled")
    }

    fn names(entry: &SignatureEntry) -> Vec<&str> {
        entry.params.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn plain_packet_has_one_entry() {
        let (ctx, r) = packet("A:$1\n+ REP\nB:$2\n- REP\npad-1\npack");
        r.unwrap();
        let set = signatures(&ctx);
        assert_eq!(set.len(), 1);
        let (sig, entry) = set.first().unwrap();
        assert_eq!(sig, "$1 [REPS] $2 [REPE] 00");
        assert_eq!(entry.description, None);
        assert_eq!(names(entry), vec!["A", "-", "B", "-", "Padding"]);
    }

    #[test]
    fn branches_expand_into_entries() {
        let (ctx, r) = packet(
            "Id:$4\n+ SubCate\nTail:$1\npack\nSubCate[A:01]\nV:$1\nSubCate[B]:02\n+ REP\nW:$2\n- REP",
        );
        r.unwrap();
        let set = signatures(&ctx);
        assert_eq!(set.len(), 2);

        let a = &set["$4 01 $1 $1"];
        assert_eq!(a.description.as_deref(), Some("A"));
        assert_eq!(names(a), vec!["Id", "- SubCate -", "V", "Tail"]);

        let b = &set["$4 02 [REPS] $2 [REPE] $1"];
        assert_eq!(names(b), vec!["Id", "- SubCate -", "-", "W", "-", "Tail"]);
    }

    #[test]
    fn empty_branch_is_dropped_with_warning() {
        let (ctx, r) = packet("+ SubCate\nSubCate[Empty]\nSubCate[B:02]\nW:$1");
        r.unwrap();
        assert_eq!(signatures(&ctx).len(), 1);
        assert!(signatures(&ctx).contains_key("02 $1"));
        assert_eq!(ctx.diagnostics.warning_count(), 1);
    }

    #[test]
    fn discriminator_only_branch_is_kept() {
        let (ctx, r) = packet("X:$1\n+ SubCate\nSubCate[A:01]\nSubCate[B:02]\nY:$2");
        r.unwrap();
        let set = signatures(&ctx);
        assert_eq!(names(&set["$1 01"]), vec!["X", "- SubCate -"]);
        assert_eq!(names(&set["$1 02 $2"]), vec!["X", "- SubCate -", "Y"]);
    }

    #[test]
    fn fragment_fields_land_before_placeholder() {
        let mut ctx = Context::new();
        let f = ctx.register_fragment("Pos", 1, "Fragment[Pos]").unwrap();
        ctx.add_line(&f, 2, "X:$2").unwrap();
        let p = ctx.register_packet("P", "10", 3, "Packet[P]:10").unwrap();
        for (n, t) in ["+ SubCate", "+ Fragment[Pos]", "SubCate[A:01]", "V:$1"].iter().enumerate() {
            ctx.add_line(&p, 4 + n, t).unwrap();
        }
        ctx.compile_packet("10").unwrap();
        let set = ctx.registry.packet("10").unwrap().signatures.as_ref().unwrap();
        let entry = &set["01 $1 $2"];
        assert_eq!(names(entry), vec!["X", "- SubCate -", "V"]);
    }

    #[test]
    fn second_placeholder_is_fatal() {
        let (_, r) = packet("+ SubCate\nA:$1\n+ SubCate");
        assert_eq!(r.unwrap_err().kind, ErrorKind::MultipleSubcatePlaceholders);
    }

    #[test]
    fn placeholder_after_pack_is_fatal() {
        let (_, r) = packet("A:$1\npack\n+ SubCate");
        assert_eq!(r.unwrap_err().kind, ErrorKind::SubcatePlaceholderAfterBody);
    }

    #[test]
    fn duplicate_description_and_discriminator_are_fatal() {
        let (_, r) = packet("+ SubCate\nSubCate[A:01]\nV:$1\nSubCate[A:02]\nW:$1");
        assert_eq!(
            r.unwrap_err().kind,
            ErrorKind::DuplicateSubcateDescription("A".to_string())
        );
        let (_, r) = packet("+ SubCate\nSubCate[A:0a]\nV:$1\nSubCate[B:0A]\nW:$1");
        assert_eq!(
            r.unwrap_err().kind,
            ErrorKind::DuplicateSubcateDiscriminator("0A".to_string())
        );
    }

    #[test]
    fn identical_branch_signatures_are_fatal() {
        let (_, r) = packet("+ SubCate\nSubCate[A]\nV:$1\nSubCate[B]\nW:$1");
        assert_eq!(
            r.unwrap_err().kind,
            ErrorKind::DuplicateBranchSignature("$1".to_string())
        );
    }

    #[test]
    fn repeat_rules() {
        let (_, r) = packet("+ REP\nA:$1\npack");
        let e = r.unwrap_err();
        assert_eq!(e.kind, ErrorKind::UnclosedRepeat);
        assert_eq!(e.line, 2);

        let (_, r) = packet("+ REP\n+ REP");
        assert_eq!(r.unwrap_err().kind, ErrorKind::NestedRepeat);

        let (_, r) = packet("- REP");
        assert_eq!(r.unwrap_err().kind, ErrorKind::UnopenedRepeat);

        let (_, r) = packet("A:$1\npack\n+ REP");
        assert_eq!(r.unwrap_err().kind, ErrorKind::RepeatOutsideBody);

        let (_, r) = packet("A:$1\n+ REP\nB:$1");
        assert_eq!(r.unwrap_err().kind, ErrorKind::UnclosedRepeat);
    }

    #[test]
    fn empty_repeat_is_preserved() {
        let (ctx, r) = packet("A:$1\n+ REP\n- REP");
        r.unwrap();
        let (sig, entry) = signatures(&ctx).first().unwrap();
        assert_eq!(sig, "$1 [REPS] [REPE]");
        assert_eq!(names(entry), vec!["A", "-", "-"]);
    }

    #[test]
    fn unknown_line_is_invalid_code() {
        let (_, r) = packet("A:$1\nwhat is this");
        let e = r.unwrap_err();
        assert_eq!(e.kind, ErrorKind::InvalidCode("Packet"));
        assert_eq!(e.raw, "what is this");
        assert_eq!(e.line, 3);
    }

    #[test]
    fn branches_without_placeholder_are_ignored() {
        let (ctx, r) = packet("A:$1\nSubCate[X:01]\nB:$2");
        r.unwrap();
        let set = signatures(&ctx);
        assert_eq!(set.len(), 1);
        assert_eq!(names(&set["$1"]), vec!["A"]);
        assert_eq!(ctx.diagnostics.warning_count(), 1);
    }

    #[test]
    fn placeholder_inside_open_branch_is_fatal() {
        let (_, r) = packet("A:$1\nSubCate[X:01]\nB:$2\n+ SubCate");
        let e = r.unwrap_err();
        assert_eq!(e.kind, ErrorKind::SubcatePlaceholderAfterBody);
        assert_eq!(e.line, 5);
    }

    #[test]
    fn repeat_open_at_next_branch_is_fatal() {
        let (_, r) = packet("+ SubCate\nSubCate[A:01]\n+ REP\nV:$1\nSubCate[B:02]\nW:$1");
        let e = r.unwrap_err();
        assert_eq!(e.kind, ErrorKind::UnclosedRepeat);
        assert_eq!(e.line, 4);
        assert_eq!(e.raw, "+ REP");
    }

    #[test]
    fn empty_last_branch_is_dropped_at_finish() {
        let (ctx, r) = packet("X:$1\n+ SubCate\nSubCate[A:01]\nV:$1\nSubCate[Empty]");
        r.unwrap();
        let set = signatures(&ctx);
        assert_eq!(set.len(), 1);
        assert!(set.contains_key("$1 01 $1"));
        assert_eq!(ctx.diagnostics.warning_count(), 1);
    }

    #[test]
    fn placeholder_without_branches_yields_no_entries() {
        let (ctx, r) = packet("A:$1\n+ SubCate\nB:$1");
        r.unwrap();
        assert!(signatures(&ctx).is_empty());
        assert_eq!(ctx.diagnostics.warning_count(), 1);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut ctx = Context::new();
        let d = ctx.register_packet("Test", "6f", 1, "Packet[Test]:6f").unwrap();
        ctx.add_line(&d, 2, "A:$1").unwrap();
        ctx.compile_packet("6f").unwrap();
        assert!(ctx.registry.packet("6F").unwrap().is_compiled());

        let e = ctx.compile_packet("7f").unwrap_err();
        assert_eq!(e.kind, ErrorKind::UndeclaredPacket("7F".to_string()));
    }

    #[test]
    fn compile_is_idempotent() {
        let (mut ctx, r) = packet("A:$1");
        r.unwrap();
        let before = signatures(&ctx).clone();
        ctx.compile_packet("6F").unwrap();
        assert_eq!(*signatures(&ctx), before);
    }
}
