fn main() {
    if let Err(err) = retail_scrub::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
