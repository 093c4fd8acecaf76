//! # Area Search Demo Entry Point
//!
//! Calls into the library's `run()` function, which streams in a generated world
//! and searches it while logging progress.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json]
//! ```

fn main() {
    if let Err(err) = voxel_area_search::run() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
