//! Compile fuzz target: feed arbitrary text through ingest, compile and assembly.
//! The compiler must not panic; it should return Ok(SignatureTable) or Err(CompileError).
//! Build with: cargo fuzz run compile_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let mut ctx = sigbuilder::Context::new();
    if let Ok(table) = sigbuilder::build(s, &mut ctx) {
        let _ = table.to_json(false);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run compile_fuzz");
}
