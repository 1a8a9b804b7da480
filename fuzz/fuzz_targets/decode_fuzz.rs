//! Decode fuzz target: arbitrary lines against the sample catalogue.
//! Every line must come back as a packet, decoded or unresolved.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
static CATALOGUE: std::sync::OnceLock<packetline::Catalogue> = std::sync::OnceLock::new();

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let catalogue = CATALOGUE.get_or_init(|| {
        packetline::Catalogue::from_dsl(include_str!("../../catalogues/sample.pkt"))
            .expect("sample catalogue")
    });
    let line = String::from_utf8_lossy(data);
    let packet = catalogue.decode(&line);
    let _ = packetline::dump_packet(&packet);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
