/// QR scanning
///
/// - `scanner.rs` - scanner trait, fixed scan parameters and start-up handoff
/// - `frame_scanner.rs` - scanner decoding camera frames with rqrr

pub mod scanner;
pub mod frame_scanner;
