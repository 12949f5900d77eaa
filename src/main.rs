fn main() {
    #[cfg(feature = "cli")]
    d2m::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("d2m: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
