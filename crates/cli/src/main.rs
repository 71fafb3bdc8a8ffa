fn main() {
    if let Err(error) = uan_marker::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
