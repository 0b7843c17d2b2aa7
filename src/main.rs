fn main() {
    if let Err(e) = hepref::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
