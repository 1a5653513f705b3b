//! Declaration registry: Fragments by name and Packets by header, insert-only.

use crate::ast::{FieldDescriptor, Signature, SignatureSet};
use crate::error::{CompileError, ErrorKind, Result};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Source line number → sanitized line text, in source order.
#[derive(Debug, Clone, Default)]
pub struct Lines(BTreeMap<usize, String>);

impl Lines {
    pub fn add(&mut self, line: usize, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if self.0.contains_key(&line) {
            return Err(CompileError::new(ErrorKind::DuplicateLine(line), line, text));
        }
        self.0.insert(line, text);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().map(|(n, s)| (*n, s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A Fragment's flattened signature and fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledFragment {
    pub signature: Signature,
    pub fields: Vec<FieldDescriptor>,
}

/// Memoization state of a Fragment.
#[derive(Debug, Clone)]
pub enum FragmentState {
    Pending,
    /// Being resolved; seeing it again means a reference cycle.
    InProgress,
    Compiled(Arc<CompiledFragment>),
}

#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    /// Line of the `Fragment[...]` header.
    pub line: usize,
    pub lines: Lines,
    pub state: FragmentState,
}

impl Fragment {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Fragment {
            name: name.into(),
            line,
            lines: Lines::default(),
            state: FragmentState::Pending,
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self.state, FragmentState::Compiled(_))
    }

    pub fn compiled(&self) -> Option<&Arc<CompiledFragment>> {
        match &self.state {
            FragmentState::Compiled(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Packet {
    pub description: String,
    /// Upper-case hex; registry key.
    pub header: String,
    /// Line of the `Packet[...]:HEX` header.
    pub line: usize,
    pub lines: Lines,
    /// Set once compiled.
    pub signatures: Option<SignatureSet>,
}

impl Packet {
    pub fn new(description: impl Into<String>, header: impl Into<String>, line: usize) -> Self {
        Packet {
            description: description.into(),
            header: header.into(),
            line,
            lines: Lines::default(),
            signatures: None,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.signatures.is_some()
    }
}

/// Handle to a registered declaration, used to append body lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclRef {
    Fragment(String),
    Packet(String),
}

/// Two independent pools in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    fragments: IndexMap<String, Fragment>,
    packets: IndexMap<String, Packet>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_fragment(&mut self, fragment: Fragment, raw: &str) -> Result<DeclRef> {
        if self.fragments.contains_key(&fragment.name) {
            return Err(CompileError::new(
                ErrorKind::DuplicateFragment(fragment.name.clone()),
                fragment.line,
                raw,
            ));
        }
        let key = fragment.name.clone();
        self.fragments.insert(key.clone(), fragment);
        Ok(DeclRef::Fragment(key))
    }

    pub fn register_packet(&mut self, packet: Packet, raw: &str) -> Result<DeclRef> {
        if self.packets.contains_key(&packet.header) {
            return Err(CompileError::new(
                ErrorKind::DuplicatePacket(packet.header.clone()),
                packet.line,
                raw,
            ));
        }
        let key = packet.header.clone();
        self.packets.insert(key.clone(), packet);
        Ok(DeclRef::Packet(key))
    }

    /// Append a body line to a registered declaration.
    pub fn add_line(&mut self, decl: &DeclRef, line: usize, text: &str) -> Result<()> {
        let lines = match decl {
            DeclRef::Fragment(name) => self.fragments.get_mut(name).map(|f| &mut f.lines),
            DeclRef::Packet(header) => self.packets.get_mut(header).map(|p| &mut p.lines),
        };
        match lines {
            Some(lines) => lines.add(line, text),
            None => Err(CompileError::new(ErrorKind::NoCurrentDeclaration, line, text)),
        }
    }

    /// Fragment by name; an absent name is an undeclared reference.
    pub fn fragment(&self, name: &str, line: usize, raw: &str) -> Result<&Fragment> {
        self.fragments
            .get(name)
            .ok_or_else(|| CompileError::new(ErrorKind::UndeclaredFragment(name.to_string()), line, raw))
    }

    pub(crate) fn fragment_mut(&mut self, name: &str) -> Option<&mut Fragment> {
        self.fragments.get_mut(name)
    }

    pub fn packet(&self, header: &str) -> Option<&Packet> {
        self.packets.get(header)
    }

    pub(crate) fn packet_mut(&mut self, header: &str) -> Option<&mut Packet> {
        self.packets.get_mut(header)
    }

    pub fn packets(&self) -> impl Iterator<Item = &Packet> {
        self.packets.values()
    }

    pub fn fragment_names(&self) -> Vec<String> {
        self.fragments.keys().cloned().collect()
    }

    pub fn packet_headers(&self) -> Vec<String> {
        self.packets.keys().cloned().collect()
    }
}
