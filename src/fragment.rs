//! Fragment resolver: flattens a Fragment into one signature and field list, expanding nested
//! `+ Fragment[...]` references. Each Fragment is built at most once.

use crate::ast::{Signature, Token};
use crate::compile::Context;
use crate::error::{CompileError, ErrorKind, Result};
use crate::parser::{parse_body_line, BodyLine};
use crate::registry::{CompiledFragment, FragmentState, Lines};
use log::debug;
use std::sync::Arc;

impl Context {
    /// Compile `name` (if not yet compiled) and return its flattened form.
    ///
    /// `line`/`raw` locate the reference for error reporting. Re-entering a Fragment that is
    /// still being resolved is a reference cycle.
    pub fn compile_fragment(&mut self, name: &str, line: usize, raw: &str) -> Result<Arc<CompiledFragment>> {
        let fragment = self.registry.fragment(name, line, raw)?;
        let (lines, header_line) = match &fragment.state {
            FragmentState::Compiled(c) => return Ok(Arc::clone(c)),
            FragmentState::InProgress => {
                let mut chain = self.resolving.clone();
                chain.push(name.to_string());
                return Err(CompileError::new(
                    ErrorKind::FragmentCycle(name.to_string(), chain.join(" -> ")),
                    line,
                    raw,
                ));
            }
            FragmentState::Pending => (fragment.lines.clone(), fragment.line),
        };

        self.diagnostics
            .info(header_line, format!("Building Signature for Fragment[{}]", name));
        self.set_fragment_state(name, FragmentState::InProgress);
        self.resolving.push(name.to_string());
        let built = self.build_fragment(&lines);
        self.resolving.pop();

        match built {
            Ok(compiled) => {
                debug!("Fragment[{}] => \"{}\"", name, compiled.signature);
                let compiled = Arc::new(compiled);
                self.set_fragment_state(name, FragmentState::Compiled(Arc::clone(&compiled)));
                Ok(compiled)
            }
            Err(e) => {
                self.set_fragment_state(name, FragmentState::Pending);
                Err(e)
            }
        }
    }

    fn build_fragment(&mut self, lines: &Lines) -> Result<CompiledFragment> {
        let mut signature = Signature::new();
        let mut fields = Vec::new();

        for (num, code) in lines.iter() {
            match parse_body_line(code, num, &mut self.diagnostics)? {
                BodyLine::Field { token, field } => {
                    signature.push(token);
                    fields.push(field);
                }
                BodyLine::FragmentRef(inner) => {
                    let nested = self.compile_fragment(&inner, num, code)?;
                    signature.extend(&nested.signature);
                    fields.extend(nested.fields.iter().cloned());
                }
                // Repeat markers inside a Fragment carry no field descriptor.
                BodyLine::RepeatStart => signature.push(Token::RepeatStart),
                BodyLine::RepeatEnd => signature.push(Token::RepeatEnd),
                _ => return Err(CompileError::new(ErrorKind::InvalidCode("Fragment"), num, code)),
            }
        }

        Ok(CompiledFragment { signature, fields })
    }

    fn set_fragment_state(&mut self, name: &str, state: FragmentState) {
        if let Some(f) = self.registry.fragment_mut(name) {
            f.state = state;
        }
    }
}
