//! Compilation context: owns both declaration pools and the diagnostics record, and drives the
//! compile-all pass (every Fragment, then every Packet, in registration order).

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::registry::{DeclRef, Fragment, Packet, Registry};

#[derive(Debug, Default)]
pub struct Context {
    pub registry: Registry,
    pub diagnostics: Diagnostics,
    /// Fragments currently being resolved, outermost first.
    pub(crate) resolving: Vec<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_fragment(&mut self, name: &str, line: usize, raw: &str) -> Result<DeclRef> {
        let decl = self.registry.register_fragment(Fragment::new(name, line), raw)?;
        self.diagnostics.info(line, format!("New Fragment[{}]", name));
        Ok(decl)
    }

    pub fn register_packet(
        &mut self,
        description: &str,
        header: &str,
        line: usize,
        raw: &str,
    ) -> Result<DeclRef> {
        let decl = self
            .registry
            .register_packet(Packet::new(description, header.to_ascii_uppercase(), line), raw)?;
        self.diagnostics
            .info(line, format!("New Packet[{:<4}] Desc[{}]", header.to_ascii_uppercase(), description));
        Ok(decl)
    }

    pub fn add_line(&mut self, decl: &DeclRef, line: usize, text: &str) -> Result<()> {
        self.registry.add_line(decl, line, text)
    }

    /// Compile every Fragment, then every Packet. A fatal error is recorded in the diagnostics
    /// and returned; nothing after it is compiled.
    pub fn compile_all(&mut self) -> Result<()> {
        let result = self.compile_all_inner();
        if let Err(e) = &result {
            self.diagnostics.fatal(e);
        }
        result
    }

    fn compile_all_inner(&mut self) -> Result<()> {
        for name in self.registry.fragment_names() {
            let line = self.registry.fragment(&name, 0, "")?.line;
            self.compile_fragment(&name, line, &name)?;
        }
        for header in self.registry.packet_headers() {
            self.compile_packet(&header)?;
        }
        Ok(())
    }
}
