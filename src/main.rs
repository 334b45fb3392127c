fn main() {
    if let Err(err) = capture_guide_lib::run() {
        eprintln!("capture-guide: {err:#}");
        std::process::exit(1);
    }
}
