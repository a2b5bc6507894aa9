fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    if let Err(err) = aml_sync::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
