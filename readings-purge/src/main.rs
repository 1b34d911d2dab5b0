fn main() {
    if let Err(err) = octopus_tado_sync::app::run_purge_readings() {
        eprintln!("readings purge failed: {err}");
        std::process::exit(1);
    }
}
