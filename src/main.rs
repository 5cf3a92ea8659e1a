//! obfsproxy
//!
//! ```text
//! obfsproxy [options] protocol_name [protocol_args...] [protocol_name ...]
//!
//!   client ──▶ listener ──▶ transport ──▶ relay ──▶ next hop
//!                 ▲
//!      signals, heartbeat, shutdown (lifecycle)
//! ```

use std::process::ExitCode;

fn main() -> ExitCode {
    match obfsproxy::run(std::env::args().skip(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("obfsproxy: {e}");
            if e.is_usage() {
                eprint!("{}", obfsproxy::usage(&obfsproxy::Registry::builtin()));
            }
            ExitCode::from(e.exit_code())
        }
    }
}
