/// Entry point of the `perfiso-ctl` command line tool.
///
/// Log output is controlled through `RUST_LOG`, e.g.
///
/// ```bash
/// RUST_LOG=debug perfiso-ctl tenant eth2 10.0.0.5 4
/// ```
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    perfiso_ctl::run(std::env::args().skip(1))
}
