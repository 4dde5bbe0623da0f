fn main() {
    if let Err(err) = awscan::cli::run() {
        awscan::ui::eprintln_error(&err);
        std::process::exit(awscan::exit::exit_code(&err));
    }
}
