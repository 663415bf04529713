fn main() {
    if let Err(error) = findxml_cli::run() {
        // run() installs the subscriber before it can fail.
        tracing::error!(%error, "findxml failed");
        std::process::exit(1);
    }
}
