fn main() {
    if let Err(err) = zaptrack::cli::run() {
        zaptrack::ui::eprintln_error(&err);
        std::process::exit(zaptrack::exit::exit_code(&err));
    }
}
